//! Lazily generated, durably cached derived assets.
//!
//! Each asset lives at a fixed name inside its source's sidecar directory.
//! A finished file only ever appears there through a rename, so anything at
//! the final path is complete. Generation is single-flight per final path
//! and runs on its own task, detached from the requests waiting for it.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::library::SourceMedia;
use crate::queue::WorkQueue;
use crate::sidecar::{is_partial_of, partial_path, SidecarLayout};
use crate::transcoder::{TranscodeError, TranscodeJob, Transcoder};

use super::error::AssetError;
use super::policy;
use super::request::AssetRequest;

/// A finished derived asset on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAsset {
    pub path: PathBuf,
    pub size: u64,
    pub mime: &'static str,
}

/// In-progress generation shared by every requester of one asset.
/// Errors are flattened to strings so the result can be cloned.
type Generation = Shared<BoxFuture<'static, Result<DerivedAsset, String>>>;

struct StoreInner {
    transcoder: Arc<dyn Transcoder>,
    queue: WorkQueue,
    layout: SidecarLayout,
    in_flight: Mutex<HashMap<PathBuf, Generation>>,
}

/// Cloneable handle to the derived-asset store.
#[derive(Clone)]
pub struct AssetStore {
    inner: Arc<StoreInner>,
}

impl AssetStore {
    pub fn new(transcoder: Arc<dyn Transcoder>, queue: WorkQueue, layout: SidecarLayout) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                transcoder,
                queue,
                layout,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Empties the shared scratch directory, if one is configured.
    ///
    /// Only safe before any generation has started.
    pub async fn clear_shared_scratch(&self) {
        let Some(scratch) = self.inner.layout.shared_scratch() else {
            return;
        };
        let Ok(mut entries) = tokio::fs::read_dir(scratch).await else {
            return;
        };
        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            match entry.file_type().await {
                Ok(t) if t.is_dir() => remove_dir_quietly(&entry.path()).await,
                _ => remove_quietly(&entry.path()).await,
            }
            removed += 1;
        }
        if removed > 0 {
            info!(path = %scratch.display(), removed, "cleared leftover scratch files");
        }
    }

    /// Number of generations currently running.
    pub async fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }

    /// Returns the asset, generating it first if it does not exist yet.
    ///
    /// Concurrent calls for the same asset share one generation. Failures
    /// are returned to every waiter and forgotten, so the next call retries.
    pub async fn get_or_create(
        &self,
        source: &SourceMedia,
        request: AssetRequest,
    ) -> Result<DerivedAsset, AssetError> {
        request.validate(source)?;

        let final_path = source.sidecar.join(request.file_name());
        let mime = request.mime();

        if let Some(asset) = existing(&final_path, mime).await? {
            return Ok(asset);
        }

        let generation = {
            let mut in_flight = self.inner.in_flight.lock().await;
            if let Some(generation) = in_flight.get(&final_path).cloned() {
                generation
            } else {
                // Finished between the first check and taking the lock
                if let Some(asset) = existing(&final_path, mime).await? {
                    return Ok(asset);
                }
                let generation = self.spawn(source.clone(), request, final_path.clone());
                in_flight.insert(final_path, generation.clone());
                generation
            }
        };

        generation.await.map_err(AssetError::Generation)
    }

    fn spawn(&self, source: SourceMedia, request: AssetRequest, final_path: PathBuf) -> Generation {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = inner.generate(&source, &request, &final_path).await;
            inner.in_flight.lock().await.remove(&final_path);
            result.map_err(|e| {
                warn!(
                    source = %source.rel_path,
                    asset = %request.file_name(),
                    "derived asset generation failed: {}",
                    e
                );
                e.to_string()
            })
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(format!("generation task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }
}

impl StoreInner {
    async fn generate(
        &self,
        source: &SourceMedia,
        request: &AssetRequest,
        final_path: &Path,
    ) -> Result<DerivedAsset, AssetError> {
        let started = Instant::now();
        let file_name = request.file_name();

        tokio::fs::create_dir_all(&source.sidecar).await?;
        sweep_partials(&source.sidecar, &file_name).await;

        let partial = partial_path(final_path);
        let produced = match (request, policy::preview_segments(source.duration)) {
            (AssetRequest::Preview, Some(starts)) => {
                self.stitch_preview(source, &starts, final_path, &partial).await
            }
            _ => self.run(policy::job_for(source, request, &partial)).await,
        };

        let committed = match produced {
            Ok(()) => tokio::fs::rename(&partial, final_path)
                .await
                .map_err(AssetError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            remove_quietly(&partial).await;
            return Err(e);
        }

        let size = tokio::fs::metadata(final_path).await?.len();
        info!(
            source = %source.rel_path,
            asset = %file_name,
            size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "derived asset generated"
        );

        Ok(DerivedAsset {
            path: final_path.to_path_buf(),
            size,
            mime: request.mime(),
        })
    }

    /// Runs one transcode through the work queue and checks it left output.
    async fn run(&self, job: TranscodeJob) -> Result<(), AssetError> {
        let output = job.output.path.clone();

        if let Err(e) = self.queue.submit(self.transcoder.convert(job)).await {
            if let TranscodeError::ConversionFailed {
                stderr: Some(ref stderr),
                ..
            } = e
            {
                debug!(output = %output.display(), stderr = %stderr, "transcoder stderr");
            }
            return Err(AssetError::Generation(e.to_string()));
        }

        match tokio::fs::metadata(&output).await {
            Ok(m) if m.len() > 0 => Ok(()),
            _ => Err(AssetError::Generation(format!(
                "transcoder left no output at {}",
                output.display()
            ))),
        }
    }

    /// Encodes preview segments in parallel into a scratch area, then joins
    /// them without re-encoding.
    async fn stitch_preview(
        &self,
        source: &SourceMedia,
        starts: &[f64],
        final_path: &Path,
        output: &Path,
    ) -> Result<(), AssetError> {
        let scratch = self.layout.scratch_dir(final_path);
        tokio::fs::create_dir_all(&scratch).await?;

        let segments: Vec<PathBuf> = (0..starts.len())
            .map(|i| scratch.join(format!("segment{}.mp4", i)))
            .collect();

        let encoded = future::try_join_all(
            starts
                .iter()
                .zip(&segments)
                .map(|(start, path)| self.run(policy::preview_segment_job(source, *start, path))),
        )
        .await;

        let result = match encoded {
            Ok(_) => self.run(policy::concat_job(segments, output)).await,
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!(path = %scratch.display(), "failed to remove scratch directory: {}", e);
        }
        result
    }
}

async fn existing(path: &Path, mime: &'static str) -> Result<Option<DerivedAsset>, AssetError> {
    match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => Ok(Some(DerivedAsset {
            path: path.to_path_buf(),
            size: m.len(),
            mime,
        })),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Removes partial files and scratch directories of `final_name` left
/// behind by an earlier process.
async fn sweep_partials(sidecar: &Path, final_name: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(sidecar).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_partial_of(&name, final_name) {
            continue;
        }
        debug!(path = %entry.path().display(), "removing stale partial");
        match entry.file_type().await {
            Ok(t) if t.is_dir() => remove_dir_quietly(&entry.path()).await,
            _ => remove_quietly(&entry.path()).await,
        }
    }
}

async fn remove_dir_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to remove scratch directory: {}", e);
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to remove partial file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{CaptureKind, CaptureSpec, Quality};
    use crate::config::MediaKind;
    use crate::testing::{fixtures, MockTranscoder};
    use crate::transcoder::{InputSource, VideoSpec};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        transcoder: Arc<MockTranscoder>,
        store: AssetStore,
        source: SourceMedia,
    }

    fn harness(duration: f64, limit: usize) -> Harness {
        let dir = TempDir::new().unwrap();
        let abs_path = fixtures::write_video(dir.path(), "clip.mp4");
        let layout = SidecarLayout::new(dir.path(), None, None);
        let source = SourceMedia {
            kind: MediaKind::Video,
            rel_path: "clip.mp4".to_string(),
            sidecar: layout.sidecar_dir(&abs_path),
            abs_path,
            mime: "video/mp4".to_string(),
            size: 64 * 1024,
            duration,
            width: Some(1920),
            height: Some(1080),
            fps: Some(30.0),
            has_audio: true,
        };
        let transcoder = Arc::new(MockTranscoder::new());
        let store = AssetStore::new(transcoder.clone(), WorkQueue::new(limit), layout);
        Harness {
            _dir: dir,
            transcoder,
            store,
            source,
        }
    }

    fn sidecar_names(source: &SourceMedia) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&source.sidecar)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_concurrent_requests_generate_once() {
        let h = harness(90.0, 4);
        h.transcoder.set_convert_delay(Duration::from_millis(50)).await;

        let results = future::join_all(
            (0..10).map(|_| h.store.get_or_create(&h.source, AssetRequest::Thumbnail)),
        )
        .await;

        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap(), &first);
        }
        assert_eq!(h.transcoder.convert_count().await, 1);
        assert_eq!(first.mime, "image/jpeg");
        assert!(first.path.ends_with("thumbnail.jpg"));
        assert_eq!(h.store.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_existing_asset_is_reused() {
        let h = harness(90.0, 1);

        let first = h.store.get_or_create(&h.source, AssetRequest::Thumbnail).await.unwrap();
        let bytes = std::fs::read(&first.path).unwrap();
        let second = h.store.get_or_create(&h.source, AssetRequest::Thumbnail).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second.path).unwrap(), bytes);
        assert_eq!(h.transcoder.convert_count().await, 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_nothing_and_is_retried() {
        let h = harness(90.0, 1);
        h.transcoder
            .fail_next(TranscodeError::conversion_failed("killed", Some("signal 9".into())))
            .await;

        let err = h
            .store
            .get_or_create(&h.source, AssetRequest::Thumbnail)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Generation(_)));
        assert!(sidecar_names(&h.source).is_empty());
        assert_eq!(h.store.in_flight().await, 0);

        let asset = h.store.get_or_create(&h.source, AssetRequest::Thumbnail).await.unwrap();
        assert!(asset.path.exists());
        assert_eq!(h.transcoder.convert_count().await, 2);
    }

    #[tokio::test]
    async fn test_stale_partial_is_swept() {
        let h = harness(90.0, 1);
        std::fs::create_dir_all(&h.source.sidecar).unwrap();
        let stale = h.source.sidecar.join(".thumbnail.jpg.0123abcd.partial");
        std::fs::write(&stale, b"half").unwrap();

        h.store.get_or_create(&h.source, AssetRequest::Thumbnail).await.unwrap();

        assert!(!stale.exists());
        assert_eq!(sidecar_names(&h.source), vec!["thumbnail.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_preview_leftovers_are_swept() {
        let h = harness(80.0, 2);
        std::fs::create_dir_all(&h.source.sidecar).unwrap();
        let scratch = h.source.sidecar.join(".preview.mp4.aaaa.partial");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("segment0.mp4"), b"seg").unwrap();
        let list = h.source.sidecar.join(".preview.mp4.bbbb.partial.concat.txt");
        std::fs::write(&list, b"file 'x'").unwrap();

        h.store.get_or_create(&h.source, AssetRequest::Preview).await.unwrap();

        assert_eq!(sidecar_names(&h.source), vec!["preview.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_shared_scratch() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(scratch.join("clip.mp4-0123")).unwrap();
        std::fs::write(scratch.join("stray.txt"), b"x").unwrap();
        let layout = SidecarLayout::new(dir.path(), None, Some(scratch.clone()));
        let store = AssetStore::new(Arc::new(MockTranscoder::new()), WorkQueue::new(1), layout);

        store.clear_shared_scratch().await;

        assert!(scratch.exists());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_generation_outlives_cancelled_request() {
        let h = harness(90.0, 1);
        h.transcoder.set_convert_delay(Duration::from_millis(100)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.store.get_or_create(&h.source, AssetRequest::Preview),
        )
        .await;
        assert!(abandoned.is_err());

        // A second requester joins the running generation
        let asset = h.store.get_or_create(&h.source, AssetRequest::Preview).await.unwrap();
        assert!(asset.path.exists());
        assert_eq!(h.transcoder.convert_count().await, 9);
    }

    #[tokio::test]
    async fn test_long_preview_is_stitched() {
        let h = harness(80.0, 2);

        let asset = h.store.get_or_create(&h.source, AssetRequest::Preview).await.unwrap();

        let jobs = h.transcoder.recorded_jobs().await;
        assert_eq!(jobs.len(), 9);
        let concat = &jobs[8].job;
        assert_eq!(concat.video, VideoSpec::Copy);
        let InputSource::Concat { ref paths } = concat.input.source else {
            panic!("expected concat input");
        };
        assert_eq!(paths.len(), 8);

        let stitched = std::fs::read(&asset.path).unwrap();
        assert!(!stitched.is_empty());
        // Scratch area is gone
        assert_eq!(sidecar_names(&h.source), vec!["preview.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_short_preview_is_single_encode() {
        let h = harness(20.0, 1);
        h.store.get_or_create(&h.source, AssetRequest::Preview).await.unwrap();
        assert_eq!(h.transcoder.convert_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_capture_generates_nothing() {
        let h = harness(90.0, 1);
        let request = AssetRequest::Capture(CaptureSpec {
            start: 30.0,
            end: 10.0,
            kind: CaptureKind::Mp4,
            quality: Quality::Low,
            silent: false,
        });

        let err = h.store.get_or_create(&h.source, request).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(h.transcoder.convert_count().await, 0);
    }

    #[tokio::test]
    async fn test_capture_and_montage_names() {
        let h = harness(90.0, 1);
        let capture = AssetRequest::Capture(CaptureSpec {
            start: 1.0,
            end: 3.0,
            kind: CaptureKind::Gif,
            quality: Quality::Low,
            silent: false,
        });

        let gif = h.store.get_or_create(&h.source, capture).await.unwrap();
        let frame = h
            .store
            .get_or_create(&h.source, AssetRequest::MontageFrame(4))
            .await
            .unwrap();

        assert!(gif.path.ends_with("capture.1-3.low.gif"));
        assert_eq!(gif.mime, "image/gif");
        assert!(frame.path.ends_with("montageshot4.jpg"));
    }
}
