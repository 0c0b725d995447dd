//! Typed directory listings for the files API.

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::transcoder::MediaTags;

use super::entry::{DerivedAssets, DirEntry, Directory, MediaFile};
use super::error::LibraryError;
use super::index::{read_derived_assets, Indexer};

/// A listing request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Directory components from the library root.
    #[serde(default)]
    pub path: Vec<String>,
    /// Case-insensitive substring matched against relative paths.
    #[serde(default)]
    pub filter: Option<String>,
    /// List every file below the directory instead of its direct children.
    #[serde(default)]
    pub subdirectories: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub approximate_size: u64,
    pub approximate_duration: f64,
    pub approximate_count: usize,
    pub results: Vec<DirSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSummary {
    pub mime: String,
    pub size: u64,
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DirSummary {
    Dir {
        name: String,
        path: String,
        item_count: usize,
        size: u64,
        duration: f64,
    },
    Photo {
        name: String,
        path: String,
        size: u64,
        mime: String,
        width: u32,
        height: u32,
        converted_formats: Vec<FormatSummary>,
    },
    Audio {
        name: String,
        path: String,
        size: u64,
        mime: String,
        duration: f64,
        #[serde(skip_serializing_if = "MediaTags::is_empty")]
        tags: MediaTags,
        converted_formats: Vec<FormatSummary>,
    },
    Video {
        name: String,
        path: String,
        size: u64,
        mime: String,
        duration: f64,
        width: u32,
        height: u32,
        fps: f64,
        has_audio: bool,
        #[serde(skip_serializing_if = "MediaTags::is_empty")]
        tags: MediaTags,
        has_thumbnail: bool,
        has_preview: bool,
        montage: Vec<u32>,
        converted_formats: Vec<FormatSummary>,
    },
}

impl DirSummary {
    pub fn name(&self) -> &str {
        match self {
            Self::Dir { name, .. }
            | Self::Photo { name, .. }
            | Self::Audio { name, .. }
            | Self::Video { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Dir { path, .. }
            | Self::Photo { path, .. }
            | Self::Audio { path, .. }
            | Self::Video { path, .. } => path,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Dir { size, .. }
            | Self::Photo { size, .. }
            | Self::Audio { size, .. }
            | Self::Video { size, .. } => *size,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Self::Dir { duration, .. } | Self::Audio { duration, .. } | Self::Video { duration, .. } => {
                *duration
            }
            Self::Photo { .. } => 0.0,
        }
    }

    fn file(file: MediaFile<'_>, assets: &DerivedAssets) -> Self {
        let info = file.info();
        let converted_formats = assets
            .converted
            .iter()
            .map(|f| FormatSummary {
                mime: f.mime.clone(),
                size: f.size,
            })
            .collect();

        match file {
            MediaFile::Photo(p) => Self::Photo {
                name: info.name.clone(),
                path: info.rel_path.clone(),
                size: info.size,
                mime: info.mime.clone(),
                width: p.width,
                height: p.height,
                converted_formats,
            },
            MediaFile::Audio(a) => Self::Audio {
                name: info.name.clone(),
                path: info.rel_path.clone(),
                size: info.size,
                mime: info.mime.clone(),
                duration: a.duration,
                tags: a.tags.clone(),
                converted_formats,
            },
            MediaFile::Video(v) => Self::Video {
                name: info.name.clone(),
                path: info.rel_path.clone(),
                size: info.size,
                mime: info.mime.clone(),
                duration: v.duration,
                width: v.width,
                height: v.height,
                fps: v.fps,
                has_audio: v.has_audio,
                tags: v.tags.clone(),
                has_thumbnail: assets.thumbnail.is_some(),
                has_preview: assets.snippet.is_some(),
                montage: assets.montage.keys().copied().collect(),
                converted_formats,
            },
        }
    }
}

/// Lists `dir` according to `query`. Subdirectories are loaded as needed.
pub async fn list_files(
    indexer: &Indexer,
    dir: &Directory,
    query: &ListQuery,
) -> Result<ListResponse, LibraryError> {
    let mut results = if query.subdirectories {
        let files = collect_files(indexer, dir).await?;
        future::join_all(files.into_iter().map(summarize_file)).await
    } else {
        let mut rows = Vec::new();
        let mut files = Vec::new();
        for entry in indexer.children(dir).await?.values() {
            match entry {
                DirEntry::Directory(sub) => rows.push(summarize_directory(indexer, sub).await?),
                other => files.extend(other.as_file()),
            }
        }
        rows.extend(future::join_all(files.into_iter().map(summarize_file)).await);
        rows
    };

    if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
        let needle = filter.to_lowercase();
        results.retain(|row| row.path().to_lowercase().contains(&needle));
    }

    results.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.path().cmp(b.path())));

    Ok(ListResponse {
        approximate_size: results.iter().map(DirSummary::size).sum(),
        approximate_duration: results.iter().map(DirSummary::duration).sum(),
        approximate_count: results.len(),
        results,
    })
}

async fn summarize_directory(indexer: &Indexer, dir: &Directory) -> Result<DirSummary, LibraryError> {
    let children = indexer.children(dir).await?;
    let files = children.values().filter_map(DirEntry::as_file);
    let (size, duration) = files.fold((0u64, 0f64), |(size, duration), file| {
        (size + file.info().size, duration + file.duration())
    });

    Ok(DirSummary::Dir {
        name: dir.name.clone(),
        path: dir.rel_path.clone(),
        item_count: children.len(),
        size,
        duration,
    })
}

/// Asset availability is read at listing time so new assets show up without a rescan.
async fn summarize_file(file: MediaFile<'_>) -> DirSummary {
    let assets = read_derived_assets(&file.info().sidecar).await;
    DirSummary::file(file, &assets)
}

fn collect_files<'a>(
    indexer: &'a Indexer,
    dir: &'a Directory,
) -> BoxFuture<'a, Result<Vec<MediaFile<'a>>, LibraryError>> {
    async move {
        let mut files = Vec::new();
        for entry in indexer.children(dir).await?.values() {
            match entry {
                DirEntry::Directory(sub) => files.extend(collect_files(indexer, sub).await?),
                other => files.extend(other.as_file()),
            }
        }
        Ok(files)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryConfig;
    use crate::library::Library;
    use crate::queue::WorkQueue;
    use crate::testing::{fixtures, MockTranscoder};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// root/
    ///   album/  song1.mp3 song2.mp3
    ///   beach.jpg
    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("album");
        std::fs::create_dir_all(&album).unwrap();
        fixtures::write_audio(&album, "song1.mp3");
        fixtures::write_audio(&album, "song2.mp3");
        fixtures::write_photo(dir.path(), "beach.jpg");
        dir
    }

    fn open(dir: &TempDir) -> Library {
        Library::open(
            LibraryConfig::new(dir.path()),
            Arc::new(MockTranscoder::new()),
            WorkQueue::new(1),
        )
    }

    #[tokio::test]
    async fn test_list_directory_with_subdirectory() {
        let dir = sample_tree();
        let library = open(&dir);

        let listing = list_files(library.indexer(), library.root(), &ListQuery::default())
            .await
            .unwrap();

        assert_eq!(listing.approximate_count, 2);
        assert_eq!(listing.results.len(), 2);
        match &listing.results[0] {
            DirSummary::Dir {
                name,
                item_count,
                duration,
                ..
            } => {
                assert_eq!(name, "album");
                assert_eq!(*item_count, 2);
                assert_eq!(*duration, 360.0);
            }
            other => panic!("expected dir, got {:?}", other),
        }
        assert!(matches!(&listing.results[1], DirSummary::Photo { name, .. } if name == "beach.jpg"));
        assert_eq!(listing.approximate_duration, 360.0);
    }

    #[tokio::test]
    async fn test_list_recursive_flattens_files() {
        let dir = sample_tree();
        let library = open(&dir);
        let query = ListQuery {
            subdirectories: true,
            ..Default::default()
        };

        let listing = list_files(library.indexer(), library.root(), &query).await.unwrap();

        let paths: Vec<_> = listing.results.iter().map(DirSummary::path).collect();
        assert_eq!(paths, vec!["beach.jpg", "album/song1.mp3", "album/song2.mp3"]);
        assert_eq!(listing.approximate_count, 3);
    }

    #[tokio::test]
    async fn test_filter_is_case_insensitive_on_path() {
        let dir = sample_tree();
        let library = open(&dir);
        let query = ListQuery {
            filter: Some("ALBUM/SONG2".to_string()),
            subdirectories: true,
            ..Default::default()
        };

        let listing = list_files(library.indexer(), library.root(), &query).await.unwrap();

        assert_eq!(listing.approximate_count, 1);
        assert_eq!(listing.results[0].name(), "song2.mp3");
    }

    #[tokio::test]
    async fn test_asset_availability_is_current() {
        let dir = TempDir::new().unwrap();
        fixtures::write_video(dir.path(), "clip.mp4");
        let library = open(&dir);

        let listing = list_files(library.indexer(), library.root(), &ListQuery::default())
            .await
            .unwrap();
        assert!(matches!(
            &listing.results[0],
            DirSummary::Video { has_thumbnail: false, .. }
        ));

        let sidecar = library.resolve_file("clip.mp4").await.unwrap().info().sidecar.clone();
        std::fs::write(sidecar.join("thumbnail.jpg"), b"jpg").unwrap();
        std::fs::write(sidecar.join("converted.webm"), b"webm").unwrap();

        let listing = list_files(library.indexer(), library.root(), &ListQuery::default())
            .await
            .unwrap();
        match &listing.results[0] {
            DirSummary::Video {
                has_thumbnail,
                converted_formats,
                ..
            } => {
                assert!(*has_thumbnail);
                assert_eq!(converted_formats.len(), 1);
                assert_eq!(converted_formats[0].mime, "video/webm");
            }
            other => panic!("expected video, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summary_serialization() {
        let dir = sample_tree();
        let library = open(&dir);

        let listing = list_files(library.indexer(), library.root(), &ListQuery::default())
            .await
            .unwrap();
        let json = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["approximateCount"], 2);
        assert_eq!(json["results"][0]["type"], "dir");
        assert_eq!(json["results"][0]["itemCount"], 2);
        assert_eq!(json["results"][1]["type"], "photo");
        assert_eq!(json["results"][1]["mime"], "image/jpeg");
        assert_eq!(json["results"][1]["width"], 4000);
    }
}
