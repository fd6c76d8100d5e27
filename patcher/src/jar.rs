use std::fs::File;
use std::path::{Path, PathBuf};

use common::EntryPath;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// A jar opened for reading.
pub struct Jar {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl Jar {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::read(path, err))?;
        let archive = ZipArchive::new(file).map_err(|err| Error::read(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in central directory order, directories included.
    pub fn names(&self) -> Vec<String> {
        (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i))
            .map(str::to_owned)
            .collect()
    }

    /// File entries in central directory order.
    pub fn entries(&self) -> Vec<EntryPath> {
        self.names()
            .iter()
            .filter(|n| !n.ends_with('/'))
            .filter_map(|n| EntryPath::parse(n).ok())
            .collect()
    }

    #[cfg(test)]
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        use std::io::Read;

        let mut r = self
            .archive
            .by_name(name)
            .map_err(|err| Error::read(&self.path, err))?;
        let mut contents = Vec::new();
        r.read_to_end(&mut contents)
            .map_err(|err| Error::read(&self.path, err))?;
        Ok(contents)
    }

    pub(crate) fn archive_mut(&mut self) -> &mut ZipArchive<File> {
        &mut self.archive
    }
}
