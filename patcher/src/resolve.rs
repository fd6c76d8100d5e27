use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::backup::{BACKUP_SUFFIX, archive_present};
use crate::error::{Error, Result};

/// Finds the jar for a configured group inside an installation root.
pub trait ResolveArchive {
    fn resolve(&self, root: &Path, name: &str, alias: &str) -> Result<PathBuf>;
}

/// How archives are laid out below an installation root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Jars sit directly in the root.
    #[default]
    Flat,
    /// Jars may sit anywhere below the root.
    Search,
}

impl Layout {
    pub fn resolver(self) -> Box<dyn ResolveArchive> {
        match self {
            Self::Flat => Box::new(FlatLayout),
            Self::Search => Box::new(SearchLayout),
        }
    }
}

pub struct FlatLayout;

impl ResolveArchive for FlatLayout {
    fn resolve(&self, root: &Path, name: &str, alias: &str) -> Result<PathBuf> {
        for candidate in [alias, name] {
            let path = root.join(candidate);
            if archive_present(&path) {
                return Ok(path);
            }
        }

        Err(Error::ArchiveNotFound {
            name: name.to_owned(),
            root: root.to_path_buf(),
        })
    }
}

pub struct SearchLayout;

impl SearchLayout {
    /// First file named `file_name`, or its backup, below `root`.
    fn find(root: &Path, file_name: &str) -> Result<Option<PathBuf>> {
        let backup_name = format!("{file_name}{BACKUP_SUFFIX}");
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(root).to_path_buf();
                Error::io(path, err.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_str();
            if name == Some(file_name) || name == Some(backup_name.as_str()) {
                return Ok(Some(entry.path().with_file_name(file_name)));
            }
        }

        Ok(None)
    }
}

impl ResolveArchive for SearchLayout {
    fn resolve(&self, root: &Path, name: &str, alias: &str) -> Result<PathBuf> {
        for candidate in [alias, name] {
            if let Some(path) = Self::find(root, candidate)? {
                debug!("resolved {name} to {}", path.display());
                return Ok(path);
            }
        }

        Err(Error::ArchiveNotFound {
            name: name.to_owned(),
            root: root.to_path_buf(),
        })
    }
}
