//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or converting.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The tool could not make sense of the file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// Conversion process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The tool exited successfully but left no output behind.
    #[error("Output file not created: {path}")]
    OutputMissing { path: PathBuf },

    /// I/O error while talking to the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Hard errors say nothing about the file itself: the tool is missing or
    /// the host is in trouble. Everything else is a problem with one file.
    pub fn is_hard(&self) -> bool {
        match self {
            Self::FfmpegNotFound { .. } | Self::FfprobeNotFound { .. } => true,
            Self::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_errors() {
        assert!(TranscodeError::FfprobeNotFound {
            path: PathBuf::from("ffprobe")
        }
        .is_hard());
        assert!(TranscodeError::Io(std::io::Error::other("disk on fire")).is_hard());
    }

    #[test]
    fn test_soft_errors() {
        assert!(!TranscodeError::probe_failed("moov atom not found").is_hard());
        assert!(!TranscodeError::ParseError {
            reason: "bad json".to_string()
        }
        .is_hard());
        assert!(!TranscodeError::Io(std::io::ErrorKind::NotFound.into()).is_hard());
    }
}
