pub mod assets;
pub mod config;
pub mod library;
pub mod queue;
pub mod sidecar;
pub mod testing;
pub mod transcoder;

pub use assets::{
    AssetError, AssetRequest, AssetStore, CaptureKind, CaptureSpec, ConvertTarget, DerivedAsset,
    Quality,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LibraryConfig,
    MediaKind, SanitizedConfig, ServerConfig,
};
pub use library::{
    list_files, DirEntry, DirSummary, Directory, IndexSummary, Library, LibraryError, ListQuery,
    ListResponse, MediaFile, SourceMedia,
};
pub use queue::{QueueStatus, WorkQueue};
pub use sidecar::SidecarLayout;
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder, TranscoderConfig};
