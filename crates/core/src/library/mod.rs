//! Library index.
//!
//! Walks the library root and builds a tree of [`DirEntry`] values. Files are
//! classified by extension, their MIME type is sniffed from content and their
//! technical metadata comes from the transcoder's probe, cached per file in
//! its sidecar directory.
//!
//! Directories are read on first access and kept for the lifetime of the
//! [`Library`]. A rescan builds a fresh `Library`. Derived-asset availability
//! is not part of the tree; listings read it from the sidecar each time.

mod entry;
mod error;
mod index;
mod listing;
mod mime;
mod probe;

pub use entry::{
    Audio, ConvertedFormat, DerivedAssets, DirEntry, Directory, FileInfo, MediaFile, Photo,
    Snippet, SourceMedia, Video,
};
pub use error::LibraryError;
pub use index::{read_derived_assets, split_path, IndexSummary, Indexer, Library};
pub use listing::{list_files, DirSummary, FormatSummary, ListQuery, ListResponse};
pub use mime::{detect_mime, guess_from_path, sniff};
pub use probe::{probe_cached, SourceStamp, PROBE_FILE};
