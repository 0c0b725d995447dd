//! Error types for the asset store.

use thiserror::Error;

/// Errors from requesting a derived asset.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The request parameters are invalid for this file.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The asset kind does not exist for this type of media.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The requested asset cannot exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The transcoder failed. Details are logged, not returned.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Filesystem error around generation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported(reason.into())
    }

    /// Whether the caller is at fault (4xx) rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::Unsupported(_) | Self::NotFound(_)
        )
    }
}
