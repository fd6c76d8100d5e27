use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("archive '{name}' not found under {}", .root.display())]
    ArchiveNotFound { name: String, root: PathBuf },

    #[error("unable to read archive {}: {source}", .path.display())]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("unable to write archive {}: {source}", .path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn is_archive_not_found(&self) -> bool {
        matches!(self, Self::ArchiveNotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(
        path: impl Into<PathBuf>,
        source: impl Into<zip::result::ZipError>,
    ) -> Self {
        Self::ArchiveRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(
        path: impl Into<PathBuf>,
        source: impl Into<zip::result::ZipError>,
    ) -> Self {
        Self::ArchiveWrite {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
