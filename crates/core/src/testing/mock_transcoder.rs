//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcoder::{
    InputSource, MediaInfo, MediaTags, TranscodeError, TranscodeJob, Transcoder,
};

/// A recorded conversion job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedJob {
    /// The job that was submitted.
    pub job: TranscodeJob,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Probe results per path, a default, or guessed from the extension
/// - Jobs recorded for assertions
/// - Injected failures, one-shot or per path
/// - A simulated conversion time
///
/// Successful conversions write placeholder bytes to the job's output path,
/// so callers see a real file appear. A failing conversion leaves a
/// truncated file behind, the way a killed encoder would.
///
/// # Example
///
/// ```rust,ignore
/// use mediashelf_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.set_probe_result("/lib/clip.mp4", MockTranscoder::video_info(30.0)).await;
///
/// let info = transcoder.probe(Path::new("/lib/clip.mp4")).await?;
/// assert_eq!(transcoder.probe_count().await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTranscoder {
    /// Recorded conversions.
    jobs: Arc<RwLock<Vec<RecordedJob>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// Persistent probe failures by path.
    probe_errors: Arc<RwLock<HashMap<PathBuf, fn() -> TranscodeError>>>,
    /// Media info for paths without a configured result.
    default_info: Arc<RwLock<Option<MediaInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TranscodeError>>>,
    /// Simulated conversion duration.
    convert_delay: Arc<RwLock<Duration>>,
    probes: AtomicUsize,
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded jobs.
    pub async fn recorded_jobs(&self) -> Vec<RecordedJob> {
        self.jobs.read().await.clone()
    }

    /// Get the number of conversions attempted.
    pub async fn convert_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Get the number of probes performed.
    pub async fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Make every probe of `path` fail.
    pub async fn set_probe_error(&self, path: impl Into<PathBuf>, make: fn() -> TranscodeError) {
        self.probe_errors.write().await.insert(path.into(), make);
    }

    /// Set the media info returned for paths without a configured result.
    pub async fn set_default_info(&self, info: MediaInfo) {
        *self.default_info.write().await = Some(info);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn fail_next(&self, error: TranscodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated conversion duration.
    pub async fn set_convert_delay(&self, delay: Duration) {
        *self.convert_delay.write().await = delay;
    }

    async fn take_error(&self) -> Option<TranscodeError> {
        self.next_error.write().await.take()
    }

    /// A 1080p30 H.264/AAC video.
    pub fn video_info(duration_secs: f64) -> MediaInfo {
        MediaInfo {
            format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration_secs: Some(duration_secs),
            width: Some(1920),
            height: Some(1080),
            fps: Some(30.0),
            video_codec: Some("h264".to_string()),
            audio_codec: Some("aac".to_string()),
            tags: MediaTags::default(),
        }
    }

    /// A tagged MP3.
    pub fn audio_info(duration_secs: f64) -> MediaInfo {
        MediaInfo {
            format: "mp3".to_string(),
            duration_secs: Some(duration_secs),
            audio_codec: Some("mp3".to_string()),
            tags: MediaTags {
                artist: Some("Test Artist".to_string()),
                album: Some("Test Album".to_string()),
                title: Some("Test Track".to_string()),
                track: Some(1),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A 4000x3000 JPEG.
    pub fn photo_info() -> MediaInfo {
        MediaInfo {
            format: "image2".to_string(),
            width: Some(4000),
            height: Some(3000),
            video_codec: Some("mjpeg".to_string()),
            ..Default::default()
        }
    }

    fn info_for_extension(path: &Path) -> MediaInfo {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "mp3" | "m4a" | "flac" | "ogg" | "opus" | "wav" => Self::audio_info(180.0),
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" => Self::photo_info(),
            _ => Self::video_info(120.0),
        }
    }

    /// Bytes a successful job leaves at its output path.
    async fn output_bytes(job: &TranscodeJob) -> Vec<u8> {
        match &job.input.source {
            InputSource::Concat { paths } => {
                let mut out = Vec::new();
                for path in paths {
                    if let Ok(bytes) = tokio::fs::read(path).await {
                        out.extend(bytes);
                    }
                }
                out
            }
            InputSource::File { path } => format!(
                "mock {} from {} at {:?}+{:?}\n",
                job.output.container.extension(),
                path.display(),
                job.input.seek,
                job.input.duration,
            )
            .into_bytes(),
        }
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(make) = self.probe_errors.read().await.get(path) {
            return Err(make());
        }

        // Check for pre-configured result
        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }

        if let Some(info) = self.default_info.read().await.as_ref() {
            return Ok(info.clone());
        }

        Ok(Self::info_for_extension(path))
    }

    async fn convert(&self, job: TranscodeJob) -> Result<(), TranscodeError> {
        let delay = *self.convert_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_error().await {
            let _ = tokio::fs::write(&job.output.path, b"trunc").await;
            self.jobs.write().await.push(RecordedJob {
                job,
                success: false,
            });
            return Err(err);
        }

        let bytes = Self::output_bytes(&job).await;
        tokio::fs::write(&job.output.path, bytes).await?;

        self.jobs.write().await.push(RecordedJob { job, success: true });
        Ok(())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::{AudioSpec, Container, InputSpec, OutputSpec, VideoEncode, VideoSpec};
    use tempfile::TempDir;

    fn frame_job(input: &Path, output: &Path) -> TranscodeJob {
        TranscodeJob {
            input: InputSpec::file(input).seek(5.0),
            video: VideoSpec::Encode(VideoEncode::frame(640)),
            audio: AudioSpec::Disabled,
            output: OutputSpec::new(output, Container::Jpeg),
        }
    }

    #[tokio::test]
    async fn test_probe_guesses_from_extension() {
        let transcoder = MockTranscoder::new();

        let video = transcoder.probe(Path::new("/lib/a.mkv")).await.unwrap();
        assert_eq!(video.width, Some(1920));
        let audio = transcoder.probe(Path::new("/lib/a.MP3")).await.unwrap();
        assert_eq!(audio.width, None);
        assert_eq!(audio.tags.artist.as_deref(), Some("Test Artist"));

        assert_eq!(transcoder.probe_count().await, 2);
    }

    #[tokio::test]
    async fn test_configured_probe_result_wins() {
        let transcoder = MockTranscoder::new();
        transcoder.set_default_info(MockTranscoder::photo_info()).await;
        transcoder
            .set_probe_result("/lib/long.mp4", MockTranscoder::video_info(3600.0))
            .await;

        let info = transcoder.probe(Path::new("/lib/long.mp4")).await.unwrap();
        assert_eq!(info.duration_secs, Some(3600.0));
        let other = transcoder.probe(Path::new("/lib/other.mp4")).await.unwrap();
        assert_eq!(other, MockTranscoder::photo_info());
    }

    #[tokio::test]
    async fn test_convert_writes_output_and_records() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("frame.jpg");
        let transcoder = MockTranscoder::new();

        transcoder
            .convert(frame_job(Path::new("/lib/a.mp4"), &output))
            .await
            .unwrap();

        assert!(output.exists());
        let jobs = transcoder.recorded_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].success);
        assert_eq!(jobs[0].job.input.seek, Some(5.0));
    }

    #[tokio::test]
    async fn test_error_injection_is_one_shot() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("frame.jpg");
        let transcoder = MockTranscoder::new();
        transcoder
            .fail_next(TranscodeError::conversion_failed("boom", None))
            .await;

        assert!(transcoder
            .convert(frame_job(Path::new("/lib/a.mp4"), &output))
            .await
            .is_err());
        assert!(transcoder
            .convert(frame_job(Path::new("/lib/a.mp4"), &output))
            .await
            .is_ok());

        let jobs = transcoder.recorded_jobs().await;
        assert!(!jobs[0].success);
        assert!(jobs[1].success);
    }

    #[tokio::test]
    async fn test_concat_joins_inputs() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"AA").unwrap();
        std::fs::write(&b, b"BB").unwrap();
        let output = dir.path().join("joined.mp4");

        let transcoder = MockTranscoder::new();
        transcoder
            .convert(TranscodeJob {
                input: InputSpec::concat(vec![a, b]),
                video: VideoSpec::Copy,
                audio: AudioSpec::Disabled,
                output: OutputSpec::new(&output, Container::Mp4),
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"AABB");
    }
}
