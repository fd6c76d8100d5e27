use std::fmt::Debug;
use std::fmt::Display;
use std::path::{Component, Path};

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;

pub mod pattern;

pub use pattern::PatternSet;

/// Identifies an archive entry using directory and base name
#[derive(Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct EntryPath {
    pub directory: String,
    pub name: String,
}

impl EntryPath {
    pub fn new(directory: String, name: String) -> Self {
        Self { directory, name }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.replace('\\', "/");
        let raw = raw.trim_start_matches('/');

        let (directory, name) = match raw.rsplit_once('/') {
            Some((directory, name)) => (directory, name),
            None => ("", raw),
        };

        if name.is_empty() {
            bail!("entry path '{raw}' has no file name");
        }

        Ok(Self::new(directory.to_owned(), name.to_owned()))
    }

    /// Builds an entry path from a path relative to some root on disk.
    pub fn from_relative(path: &Path) -> Result<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .with_context(|| format!("non utf-8 path {}", path.display()))?,
                ),
                Component::CurDir => {}
                _ => bail!("{} is not a relative path", path.display()),
            }
        }

        Self::parse(&parts.join("/"))
    }

    pub fn path(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.directory, self.name)
        }
    }
}

impl Display for EntryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl Debug for EntryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.directory, self.name)
    }
}
