//! Backup and restore of patched archives.
//!
//! The backup of `app.jar` is `app.jar.orig` next to it. When the backup
//! exists `app.jar` is a patched artifact, otherwise it is the original.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const BACKUP_SUFFIX: &str = ".orig";

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Returns the file holding the untouched contents of `path`.
pub fn pristine_source(path: &Path) -> PathBuf {
    let backup = backup_path(path);
    if backup.is_file() {
        backup
    } else {
        path.to_path_buf()
    }
}

/// An archive counts as present when either it or its backup exists. A run
/// interrupted after the backup rename leaves only the backup behind.
pub fn archive_present(path: &Path) -> bool {
    path.is_file() || backup_path(path).is_file()
}

/// The archive a backup file belongs to, `None` for anything else.
pub fn backed_up_archive(path: &Path) -> Option<PathBuf> {
    is_backup(path).then(|| strip_suffix(path))
}

/// Moves `path` aside unless a backup already exists, returns the backup.
pub fn ensure_backup(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path);
    if backup.exists() {
        debug!("backup {} already exists", backup.display());
        return Ok(backup);
    }

    info!("backing up {} as {}", path.display(), backup.display());
    fs::rename(path, &backup).map_err(|err| Error::io(path, err))?;
    Ok(backup)
}

/// Moves every backup under `roots` back over its patched archive.
pub fn restore<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut restored = Vec::new();

    for root in roots {
        let root = root.as_ref();
        if !root.exists() {
            debug!("nothing to restore in missing {}", root.display());
            continue;
        }

        // renaming while walking would disturb the iterator
        let mut backups = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(root).to_path_buf();
                Error::io(path, err.into())
            })?;
            if entry.file_type().is_file() && is_backup(entry.path()) {
                backups.push(entry.into_path());
            }
        }

        for backup in backups {
            let original = strip_suffix(&backup);
            fs::rename(&backup, &original).map_err(|err| Error::io(&backup, err))?;
            info!("restored {}", original.display());
            restored.push(original);
        }
    }

    Ok(restored)
}

fn is_backup(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > BACKUP_SUFFIX.len() && n.ends_with(BACKUP_SUFFIX))
}

fn strip_suffix(backup: &Path) -> PathBuf {
    let name = backup
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(BACKUP_SUFFIX))
        .unwrap_or_default();
    backup.with_file_name(name)
}
