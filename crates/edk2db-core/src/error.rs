use std::path::PathBuf;

use thiserror::Error;

/// Core error type shared across edk2db crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A workspace or package path does not point at a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// A file could not be read.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results returned by edk2db crates.
pub type Result<T> = std::result::Result<T, Error>;
