//! Probe results cached in each file's sidecar as `probe.json`.
//!
//! A cache entry records the size and modification time of the source it
//! was taken from. When either changes the file was replaced: the entry is
//! ignored, the derived assets in the sidecar are discarded and the file is
//! probed again.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::sidecar::partial_path;
use crate::transcoder::{MediaInfo, TranscodeError, Transcoder};

/// File name of the probe cache inside a sidecar.
pub const PROBE_FILE: &str = "probe.json";

/// Identity of a source file at probe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    pub size: u64,
    pub mtime_ms: u64,
}

impl SourceStamp {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            size: metadata.len(),
            mtime_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProbeCacheFile {
    source: SourceStamp,
    info: MediaInfo,
}

/// Returns the cached probe result for a file, probing it on a miss.
pub async fn probe_cached(
    transcoder: &dyn Transcoder,
    abs_path: &Path,
    sidecar: &Path,
    stamp: SourceStamp,
) -> Result<MediaInfo, TranscodeError> {
    let cache_path = sidecar.join(PROBE_FILE);

    match read_cache(&cache_path).await {
        Some(cached) if cached.source == stamp => return Ok(cached.info),
        Some(_) => {
            debug!(path = %abs_path.display(), "source changed since last probe");
            purge_sidecar(sidecar).await;
        }
        None => {}
    }

    let info = transcoder.probe(abs_path).await?;

    let cache = ProbeCacheFile {
        source: stamp,
        info: info.clone(),
    };
    if let Err(e) = write_cache(sidecar, &cache_path, &cache).await {
        // Read-only libraries still index, they just probe every time
        warn!(path = %cache_path.display(), "failed to write probe cache: {}", e);
    }

    Ok(info)
}

async fn read_cache(path: &Path) -> Option<ProbeCacheFile> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(cache) => Some(cache),
        Err(e) => {
            debug!(path = %path.display(), "ignoring unreadable probe cache: {}", e);
            None
        }
    }
}

async fn write_cache(
    sidecar: &Path,
    cache_path: &Path,
    cache: &ProbeCacheFile,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(sidecar).await?;
    let json = serde_json::to_vec_pretty(cache).map_err(std::io::Error::other)?;
    let tmp = partial_path(cache_path);
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, cache_path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Removes every file in a sidecar. Subdirectories (scratch areas of
/// in-flight generations) are left alone.
async fn purge_sidecar(sidecar: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(sidecar).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!(path = %entry.path().display(), "failed to remove stale asset: {}", e);
            }
        }
    }
}
