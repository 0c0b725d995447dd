//! Directory-entry tree of the library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use crate::config::MediaKind;
use crate::transcoder::MediaTags;

/// A browser-compatible transcode already present in a file's sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedFormat {
    pub mime: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Attributes shared by every file entry.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    /// Path relative to the library root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    /// Sidecar directory holding this file's derived assets.
    pub sidecar: PathBuf,
    pub size: u64,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub file: FileInfo,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Audio {
    pub file: FileInfo,
    pub duration: f64,
    pub tags: MediaTags,
}

/// A generated short silent preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub path: PathBuf,
    pub size: u64,
}

/// Derived assets currently present in a file's sidecar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedAssets {
    pub thumbnail: Option<PathBuf>,
    pub snippet: Option<Snippet>,
    /// Montage frames keyed by timestamp in seconds.
    pub montage: BTreeMap<u32, PathBuf>,
    /// MIME-unique list of existing conversions.
    pub converted: Vec<ConvertedFormat>,
}

#[derive(Debug, Clone)]
pub struct Video {
    pub file: FileInfo,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
    pub tags: MediaTags,
}

/// A directory whose children are read on first access and then kept.
#[derive(Debug)]
pub struct Directory {
    pub name: String,
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub(crate) children: OnceCell<BTreeMap<String, DirEntry>>,
}

impl Directory {
    pub(crate) fn new(name: String, rel_path: String, abs_path: PathBuf) -> Self {
        Self {
            name,
            rel_path,
            abs_path,
            children: OnceCell::new(),
        }
    }

    /// Children, if this directory has been read already.
    pub fn loaded_children(&self) -> Option<&BTreeMap<String, DirEntry>> {
        self.children.get()
    }
}

/// One node of the library tree. A directory owns its children.
#[derive(Debug)]
pub enum DirEntry {
    Directory(Directory),
    Photo(Photo),
    Audio(Audio),
    Video(Video),
}

impl DirEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(d) => &d.name,
            Self::Photo(p) => &p.file.name,
            Self::Audio(a) => &a.file.name,
            Self::Video(v) => &v.file.name,
        }
    }

    pub fn rel_path(&self) -> &str {
        match self {
            Self::Directory(d) => &d.rel_path,
            Self::Photo(p) => &p.file.rel_path,
            Self::Audio(a) => &a.file.rel_path,
            Self::Video(v) => &v.file.rel_path,
        }
    }

    pub fn abs_path(&self) -> &Path {
        match self {
            Self::Directory(d) => &d.abs_path,
            Self::Photo(p) => &p.file.abs_path,
            Self::Audio(a) => &a.file.abs_path,
            Self::Video(v) => &v.file.abs_path,
        }
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Self::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<MediaFile<'_>> {
        match self {
            Self::Directory(_) => None,
            Self::Photo(p) => Some(MediaFile::Photo(p)),
            Self::Audio(a) => Some(MediaFile::Audio(a)),
            Self::Video(v) => Some(MediaFile::Video(v)),
        }
    }
}

/// Borrowed view of a file entry.
#[derive(Debug, Clone, Copy)]
pub enum MediaFile<'a> {
    Photo(&'a Photo),
    Audio(&'a Audio),
    Video(&'a Video),
}

impl<'a> MediaFile<'a> {
    pub fn info(&self) -> &'a FileInfo {
        match self {
            Self::Photo(p) => &p.file,
            Self::Audio(a) => &a.file,
            Self::Video(v) => &v.file,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Photo(_) => MediaKind::Photo,
            Self::Audio(_) => MediaKind::Audio,
            Self::Video(_) => MediaKind::Video,
        }
    }

    /// Playback length in seconds; photos have none.
    pub fn duration(&self) -> f64 {
        match self {
            Self::Photo(_) => 0.0,
            Self::Audio(a) => a.duration,
            Self::Video(v) => v.duration,
        }
    }

    /// Owned description used to generate derived assets.
    pub fn to_source(&self) -> SourceMedia {
        let info = self.info();
        let (width, height, fps, has_audio) = match self {
            Self::Photo(p) => (Some(p.width), Some(p.height), None, false),
            Self::Audio(_) => (None, None, None, true),
            Self::Video(v) => (Some(v.width), Some(v.height), Some(v.fps), v.has_audio),
        };
        SourceMedia {
            kind: self.kind(),
            rel_path: info.rel_path.clone(),
            abs_path: info.abs_path.clone(),
            sidecar: info.sidecar.clone(),
            mime: info.mime.clone(),
            size: info.size,
            duration: self.duration(),
            width,
            height,
            fps,
            has_audio,
        }
    }
}

/// Everything the asset store needs to know about a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    pub kind: MediaKind,
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub sidecar: PathBuf,
    pub mime: String,
    pub size: u64,
    pub duration: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub has_audio: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_info(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            rel_path: format!("trips/{}", name),
            abs_path: PathBuf::from(format!("/lib/trips/{}", name)),
            sidecar: PathBuf::from(format!("/lib/trips/.mediashelf/{}", name)),
            size: 1000,
            mime: "video/mp4".to_string(),
        }
    }

    #[test]
    fn test_entry_accessors() {
        let entry = DirEntry::Video(Video {
            file: file_info("beach.mp4"),
            duration: 42.0,
            width: 1920,
            height: 1080,
            fps: 29.97,
            has_audio: true,
            tags: MediaTags::default(),
        });

        assert_eq!(entry.name(), "beach.mp4");
        assert_eq!(entry.rel_path(), "trips/beach.mp4");
        assert!(entry.as_directory().is_none());

        let file = entry.as_file().unwrap();
        assert_eq!(file.kind(), MediaKind::Video);
        assert_eq!(file.duration(), 42.0);

        let source = file.to_source();
        assert_eq!(source.width, Some(1920));
        assert_eq!(source.fps, Some(29.97));
        assert!(source.has_audio);
    }

    #[test]
    fn test_photo_source_has_no_duration() {
        let entry = DirEntry::Photo(Photo {
            file: file_info("a.jpg"),
            width: 4000,
            height: 3000,
        });
        let source = entry.as_file().unwrap().to_source();
        assert_eq!(source.kind, MediaKind::Photo);
        assert_eq!(source.duration, 0.0);
        assert_eq!(source.fps, None);
    }

    #[test]
    fn test_directory_starts_unloaded() {
        let dir = Directory::new("trips".into(), "trips".into(), PathBuf::from("/lib/trips"));
        assert!(dir.loaded_children().is_none());
        let entry = DirEntry::Directory(dir);
        assert!(entry.as_file().is_none());
        assert_eq!(entry.abs_path(), Path::new("/lib/trips"));
    }
}
