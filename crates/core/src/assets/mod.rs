//! Derived-asset store.
//!
//! Thumbnails, previews, montage frames, captures and conversions are
//! generated on first request through the transcoder and kept in the
//! source file's sidecar directory indefinitely.

mod error;
pub mod policy;
mod request;
mod store;

pub use error::AssetError;
pub use request::{
    AssetRequest, CaptureKind, CaptureSpec, ConvertTarget, Quality, MAX_CAPTURE_SECS,
};
pub use store::{AssetStore, DerivedAsset};
