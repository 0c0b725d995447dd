//! HTTP surface of the media library: listing, file and derived-asset
//! serving with byte ranges, and rescans.

pub mod api;
pub mod state;
