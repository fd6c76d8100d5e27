use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::EntryPath;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file in the staging tree standing in for an archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub entry: EntryPath,
    pub source: PathBuf,
}

impl Replacement {
    pub fn key(&self) -> &str {
        &self.entry.name
    }

    pub fn archive_path(&self) -> String {
        self.entry.path()
    }
}

/// Staged replacements keyed by base name.
///
/// Several files may share a base name; they are told apart by the directory
/// they sit in, which has to equal the directory of the archive entry.
#[derive(Debug, Clone, Default)]
pub struct ReplacementIndex {
    replacements: BTreeMap<String, Vec<Replacement>>,
}

impl ReplacementIndex {
    pub fn build(staging_root: &Path) -> Result<Self> {
        let mut index = Self::default();
        for (entry, source) in walk_files(staging_root)? {
            debug!("indexed {entry} from {}", source.display());
            index.insert(Replacement { entry, source });
        }

        Ok(index)
    }

    pub fn insert(&mut self, replacement: Replacement) {
        self.replacements
            .entry(replacement.key().to_owned())
            .or_default()
            .push(replacement);
    }

    fn get(&self, key: &str) -> &[Replacement] {
        self.replacements.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, entry: &EntryPath) -> Option<usize> {
        self.get(&entry.name)
            .iter()
            .position(|r| r.entry.directory == entry.directory)
    }

    #[cfg(test)]
    fn find(&self, entry: &EntryPath) -> Option<&Replacement> {
        self.position(entry).map(|i| &self.get(&entry.name)[i])
    }

    /// Removes and returns the replacement for `entry`, if there is one.
    pub fn claim(&mut self, entry: &EntryPath) -> Option<Replacement> {
        let position = self.position(entry)?;
        let candidates = self.replacements.get_mut(&entry.name)?;
        let replacement = candidates.remove(position);
        if candidates.is_empty() {
            self.replacements.remove(&entry.name);
        }

        Some(replacement)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
        self.replacements.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.replacements.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// A directory whose files are added wholesale to a rewritten archive.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    files: Vec<Replacement>,
}

impl Overlay {
    /// Scans `dir`; a directory that does not exist is an empty overlay.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            debug!("no overlay at {}", dir.display());
            return Ok(Self::default());
        }

        let files = walk_files(dir)?
            .into_iter()
            .map(|(entry, source)| Replacement { entry, source })
            .collect();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[Replacement] {
        &self.files
    }

    pub fn contains(&self, archive_path: &str) -> bool {
        self.files.iter().any(|f| f.archive_path() == archive_path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn walk_files(root: &Path) -> Result<Vec<(EntryPath, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            Error::io(path, err.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| Error::io(entry.path(), std::io::Error::other(err)))?;
        let entry_path = EntryPath::from_relative(relative)
            .map_err(|err| Error::io(entry.path(), std::io::Error::other(err.to_string())))?;
        files.push((entry_path, entry.into_path()));
    }

    Ok(files)
}
