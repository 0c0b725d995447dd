//! Library index: lazy directory tree over the library root.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{LibraryConfig, MediaKind};
use crate::queue::WorkQueue;
use crate::sidecar::{SidecarLayout, SIDECAR_NAMESPACE};
use crate::transcoder::{MediaInfo, Transcoder};

use super::entry::{
    Audio, ConvertedFormat, DerivedAssets, DirEntry, Directory, FileInfo, MediaFile, Photo,
    Snippet, Video,
};
use super::error::LibraryError;
use super::mime::{detect_mime, guess_from_path};
use super::probe::{probe_cached, SourceStamp};

/// Counts gathered by a full build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub directories: usize,
    pub files: usize,
}

/// A file found while reading a directory, before it is probed.
struct FileCandidate {
    name: String,
    rel_path: String,
    abs_path: PathBuf,
    kind: MediaKind,
    metadata: std::fs::Metadata,
}

/// Why a single file was left out of the tree.
#[derive(Debug)]
enum Skip {
    Soft(String),
    Fatal(LibraryError),
}

/// Shared context for reading directories and building file entries.
pub struct Indexer {
    config: LibraryConfig,
    layout: SidecarLayout,
    transcoder: Arc<dyn Transcoder>,
    queue: WorkQueue,
}

impl Indexer {
    pub fn new(config: LibraryConfig, transcoder: Arc<dyn Transcoder>, queue: WorkQueue) -> Self {
        let layout = SidecarLayout::new(
            config.root.clone(),
            config.previews_dir.clone(),
            config.scratch_dir.clone(),
        );
        Self {
            config,
            layout,
            transcoder,
            queue,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn layout(&self) -> &SidecarLayout {
        &self.layout
    }

    /// Children of `dir`, reading the directory on first access.
    pub async fn children<'a>(
        &self,
        dir: &'a Directory,
    ) -> Result<&'a BTreeMap<String, DirEntry>, LibraryError> {
        dir.children
            .get_or_try_init(|| self.read_directory(&dir.abs_path, &dir.rel_path))
            .await
    }

    async fn read_directory(
        &self,
        abs_path: &Path,
        rel_path: &str,
    ) -> Result<BTreeMap<String, DirEntry>, LibraryError> {
        let started = Instant::now();
        let read_dir_err = |source| LibraryError::ReadDir {
            path: abs_path.to_path_buf(),
            source,
        };

        let mut read_dir = tokio::fs::read_dir(abs_path).await.map_err(read_dir_err)?;
        let mut children = BTreeMap::new();
        let mut candidates = Vec::new();

        while let Some(entry) = read_dir.next_entry().await.map_err(read_dir_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SIDECAR_NAMESPACE {
                continue;
            }

            let path = entry.path();
            let is_symlink = entry
                .file_type()
                .await
                .map(|t| t.is_symlink())
                .unwrap_or(false);
            // Follows symlinks
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable entry: {}", e);
                    continue;
                }
            };
            // Linked files are indexed, linked directories could loop back to an ancestor
            if is_symlink && metadata.is_dir() {
                debug!(path = %path.display(), "skipping symlinked directory");
                continue;
            }

            if !self.config.include_hidden && is_hidden(&name, &metadata) {
                continue;
            }

            let child_rel = join_rel(rel_path, &name);
            if metadata.is_dir() {
                let dir = Directory::new(name.clone(), child_rel, path);
                children.insert(name, DirEntry::Directory(dir));
            } else if metadata.is_file() {
                let kind = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(|e| self.config.classify_extension(e));
                if let Some(kind) = kind {
                    candidates.push(FileCandidate {
                        name,
                        rel_path: child_rel,
                        abs_path: path,
                        kind,
                        metadata,
                    });
                }
            }
        }

        let built = future::join_all(
            candidates
                .into_iter()
                .map(|candidate| self.queue.submit(self.build_file(candidate))),
        )
        .await;

        for result in built {
            match result {
                Ok(entry) => {
                    children.insert(entry.name().to_string(), entry);
                }
                Err(Skip::Soft(reason)) => warn!("{}", reason),
                Err(Skip::Fatal(e)) => return Err(e),
            }
        }

        debug!(
            path = %abs_path.display(),
            entries = children.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "directory indexed"
        );
        Ok(children)
    }

    async fn build_file(&self, candidate: FileCandidate) -> Result<DirEntry, Skip> {
        let FileCandidate {
            name,
            rel_path,
            abs_path,
            kind,
            metadata,
        } = candidate;
        let soft = |what: String| Skip::Soft(format!("excluding {}: {}", rel_path, what));

        let mime = match detect_mime(&abs_path).await {
            Ok(Some(mime)) => mime,
            Ok(None) => return Err(soft("unknown MIME type".to_string())),
            Err(e) => return Err(soft(format!("unreadable: {}", e))),
        };

        let sidecar = self.layout.sidecar_dir(&abs_path);
        let stamp = SourceStamp::from_metadata(&metadata);
        let media = match probe_cached(self.transcoder.as_ref(), &abs_path, &sidecar, stamp).await
        {
            Ok(info) => info,
            Err(e) if e.is_hard() => {
                return Err(Skip::Fatal(LibraryError::Probe {
                    path: abs_path,
                    source: e,
                }))
            }
            Err(e) => return Err(soft(e.to_string())),
        };

        let file = FileInfo {
            name,
            rel_path: rel_path.clone(),
            abs_path,
            sidecar,
            size: metadata.len(),
            mime,
        };

        build_entry(kind, file, media).map_err(soft)
    }
}

/// Turns a probed file into an entry, rejecting missing or nonsensical numbers.
fn build_entry(kind: MediaKind, file: FileInfo, media: MediaInfo) -> Result<DirEntry, String> {
    let duration = || match media.duration_secs {
        Some(d) if d.is_finite() && d >= 0.0 => Ok(d),
        Some(d) => Err(format!("invalid duration {}", d)),
        None => Err("missing duration".to_string()),
    };

    let dimensions = || match (media.width, media.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err("missing dimensions".to_string()),
    };

    Ok(match kind {
        MediaKind::Photo => {
            let (width, height) = dimensions()?;
            DirEntry::Photo(Photo {
                file,
                width,
                height,
            })
        }
        MediaKind::Audio => {
            if media.audio_codec.is_none() {
                return Err("no audio stream".to_string());
            }
            DirEntry::Audio(Audio {
                file,
                duration: duration()?,
                tags: media.tags,
            })
        }
        MediaKind::Video => {
            let duration = duration()?;
            let (width, height) = dimensions()?;
            let fps = match media.fps {
                Some(fps) if fps.is_finite() && fps > 0.0 => fps,
                _ => return Err("missing frame rate".to_string()),
            };
            DirEntry::Video(Video {
                file,
                duration,
                width,
                height,
                fps,
                has_audio: media.audio_codec.is_some(),
                tags: media.tags,
            })
        }
    })
}

/// Lists derived assets present in a sidecar right now. Partial files are ignored.
pub async fn read_derived_assets(sidecar: &Path) -> DerivedAssets {
    let mut assets = DerivedAssets::default();
    let Ok(mut entries) = tokio::fs::read_dir(sidecar).await else {
        return assets;
    };

    let mut converted: BTreeMap<String, ConvertedFormat> = BTreeMap::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let path = entry.path();

        if name == "thumbnail.jpg" {
            assets.thumbnail = Some(path);
        } else if name == "preview.mp4" {
            assets.snippet = Some(Snippet {
                path,
                size: metadata.len(),
            });
        } else if let Some(secs) = name
            .strip_prefix("montageshot")
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .and_then(|secs| secs.parse::<u32>().ok())
        {
            assets.montage.insert(secs, path);
        } else if name.starts_with("converted.") {
            if let Some(mime) = guess_from_path(&path) {
                converted.entry(mime.clone()).or_insert(ConvertedFormat {
                    mime,
                    path,
                    size: metadata.len(),
                });
            }
        }
    }

    assets.converted = converted.into_values().collect();
    assets
}

fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Dotfiles everywhere, plus the hidden attribute on Windows.
fn is_hidden(name: &str, metadata: &std::fs::Metadata) -> bool {
    if name.starts_with('.') {
        return true;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
    }

    #[cfg(not(windows))]
    {
        let _ = metadata;
        false
    }
}

/// Splits a request path into lookup components, dropping empty and `.` parts.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

/// The media library: an index root plus the context to load it.
pub struct Library {
    indexer: Arc<Indexer>,
    root: Directory,
}

impl Library {
    /// Creates a library over `config.root`. Nothing is read until first access.
    pub fn open(config: LibraryConfig, transcoder: Arc<dyn Transcoder>, queue: WorkQueue) -> Self {
        let root = Directory::new(String::new(), String::new(), config.root.clone());
        Self {
            indexer: Arc::new(Indexer::new(config, transcoder, queue)),
            root,
        }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Reads the whole tree. A directory that cannot be read aborts the build.
    pub async fn build(&self) -> Result<IndexSummary, LibraryError> {
        let started = Instant::now();
        info!(root = %self.root.abs_path.display(), "indexing library");

        let summary = self.build_dir(&self.root).await?;

        info!(
            directories = summary.directories,
            files = summary.files,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "library indexed"
        );
        Ok(summary)
    }

    fn build_dir<'a>(&'a self, dir: &'a Directory) -> BoxFuture<'a, Result<IndexSummary, LibraryError>> {
        async move {
            let children = self.indexer.children(dir).await?;
            let mut summary = IndexSummary {
                directories: 1,
                files: 0,
            };

            let subdirs = children.values().filter_map(DirEntry::as_directory);
            for sub in future::try_join_all(subdirs.map(|d| self.build_dir(d))).await? {
                summary.directories += sub.directories;
                summary.files += sub.files;
            }
            summary.files += children.values().filter(|e| e.as_file().is_some()).count();

            Ok(summary)
        }
        .boxed()
    }

    /// Resolves a directory from path components.
    ///
    /// Empty and `.` components are ignored; a missing component or a file
    /// in the middle of the path is `NotFound`.
    pub async fn resolve_directory<S: AsRef<str>>(
        &self,
        components: &[S],
    ) -> Result<&Directory, LibraryError> {
        let mut dir = &self.root;
        let mut walked = String::new();

        for component in components.iter().map(AsRef::as_ref) {
            if component.is_empty() || component == "." {
                continue;
            }
            walked = join_rel(&walked, component);
            let children = self.indexer.children(dir).await?;
            dir = match children.get(component) {
                Some(DirEntry::Directory(d)) => d,
                Some(_) => return Err(LibraryError::NotADirectory(walked)),
                None => return Err(LibraryError::NotFound(walked)),
            };
        }

        Ok(dir)
    }

    /// Resolves a file from a `/`-separated path relative to the root.
    pub async fn resolve_file(&self, path: &str) -> Result<MediaFile<'_>, LibraryError> {
        let components = split_path(path);
        let Some((name, parents)) = components.split_last() else {
            return Err(LibraryError::NotAFile(path.to_string()));
        };

        let dir = self.resolve_directory(parents).await.map_err(|e| match e {
            LibraryError::NotADirectory(_) => LibraryError::NotFound(path.to_string()),
            other => other,
        })?;

        let children = self.indexer.children(dir).await?;
        match children.get(*name) {
            Some(DirEntry::Directory(_)) => Err(LibraryError::NotAFile(path.to_string())),
            Some(entry) => entry
                .as_file()
                .ok_or_else(|| LibraryError::NotFound(path.to_string())),
            None => Err(LibraryError::NotFound(path.to_string())),
        }
    }
}
