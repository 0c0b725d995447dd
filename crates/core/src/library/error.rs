//! Error types for the library index.

use std::path::PathBuf;
use thiserror::Error;

use crate::transcoder::TranscodeError;

/// Errors from resolving or indexing library entries.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Nothing at this path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The path resolves to a file where a directory was expected.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The path resolves to a directory where a file was expected.
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// A directory could not be read. Aborts the enclosing build.
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The probe tool itself is unusable. Aborts the enclosing build.
    #[error("Probe failed for {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: TranscodeError,
    },
}

impl LibraryError {
    /// Whether the caller asked for something that is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NotADirectory(_) | Self::NotAFile(_)
        )
    }
}
