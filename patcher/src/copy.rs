use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use common::PatternSet;
use tracing::{info, warn};

use crate::config::GroupSpec;
use crate::error::{Error, Result};
use crate::jar::Jar;

/// Copies every file entry of `archive` matched by `patterns` below
/// `destination`, keeping the entry's path. Returns the copied names.
pub fn copy_classes(
    archive: &Path,
    destination: &Path,
    patterns: &PatternSet,
) -> Result<Vec<String>> {
    let mut jar = Jar::open(archive)?;
    let mut copied = Vec::new();

    for i in 0..jar.archive_mut().len() {
        let mut entry = jar
            .archive_mut()
            .by_index(i)
            .map_err(|err| Error::read(archive, err))?;
        let name = entry.name().to_owned();
        if entry.is_dir() || !patterns.matches(&name) {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping unsafe entry name {name}");
            continue;
        };

        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| Error::read(archive, err))?;
        fs::write(&target, contents).map_err(|err| Error::io(&target, err))?;
        info!("copied {name}");
        copied.push(name);
    }

    Ok(copied)
}

/// Pulls the configured classes out of a built distribution.
pub struct Extractor {
    dist_root: PathBuf,
}

impl Extractor {
    pub fn new(dist_root: PathBuf) -> Self {
        Self { dist_root }
    }

    /// Extracts group `name` into `staging_root/name`, the overlay layout
    /// the tree patcher consumes.
    pub fn extract_group(
        &self,
        name: &str,
        group: &GroupSpec,
        staging_root: &Path,
    ) -> Result<Vec<String>> {
        let archive = self.dist_root.join(name);
        if !archive.is_file() {
            return Err(Error::ArchiveNotFound {
                name: name.to_owned(),
                root: self.dist_root.clone(),
            });
        }

        let destination = staging_root.join(name);
        fs::create_dir_all(&destination).map_err(|err| Error::io(&destination, err))?;
        copy_classes(&archive, &destination, &group.patterns()?)
    }
}
