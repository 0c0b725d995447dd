use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

use mediashelf_core::{
    AssetStore, Config, IndexSummary, Library, LibraryError, QueueStatus, SanitizedConfig,
    SidecarLayout, Transcoder, WorkQueue,
};

/// Shared application state
pub struct AppState {
    config: Config,
    transcoder: Arc<dyn Transcoder>,
    queue: WorkQueue,
    library: RwLock<Arc<Library>>,
    assets: AssetStore,
}

impl AppState {
    pub fn new(config: Config, transcoder: Arc<dyn Transcoder>) -> Self {
        let queue = WorkQueue::new(config.library.effective_concurrency());
        let layout = SidecarLayout::new(
            config.library.root.clone(),
            config.library.previews_dir.clone(),
            config.library.scratch_dir.clone(),
        );
        let library = Library::open(
            config.library.clone(),
            Arc::clone(&transcoder),
            queue.clone(),
        );
        let assets = AssetStore::new(Arc::clone(&transcoder), queue.clone(), layout);

        Self {
            config,
            transcoder,
            queue,
            library: RwLock::new(Arc::new(library)),
            assets,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.transcoder.as_ref()
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// The current library. Requests keep using the one they started with
    /// when a rescan swaps in a new one.
    pub async fn library(&self) -> Arc<Library> {
        Arc::clone(&*self.library.read().await)
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Indexes the library from scratch and replaces the current one.
    ///
    /// On failure the previous library stays in place.
    pub async fn rescan(&self) -> Result<IndexSummary, LibraryError> {
        let started = Instant::now();
        let library = Library::open(
            self.config.library.clone(),
            Arc::clone(&self.transcoder),
            self.queue.clone(),
        );
        let summary = library.build().await?;

        *self.library.write().await = Arc::new(library);
        info!(
            directories = summary.directories,
            files = summary.files,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "library rescanned"
        );
        Ok(summary)
    }
}
