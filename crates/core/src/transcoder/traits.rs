//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscodeError;
use super::types::{MediaInfo, TranscodeJob};

/// An external media tool that can inspect and convert files.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Extracts technical metadata without decoding the whole file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError>;

    /// Runs a conversion to completion.
    ///
    /// On success the output file exists at `job.output.path`. On failure the
    /// output path may hold garbage; callers write to temporary paths.
    async fn convert(&self, job: TranscodeJob) -> Result<(), TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
