//! Testing utilities: a mock transcoder and library fixtures.
//!
//! The mock stands in for ffmpeg/ffprobe so the index, the asset store and
//! the HTTP layer can be exercised without external tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediashelf_core::testing::{fixtures, MockTranscoder};
//!
//! let dir = tempfile::TempDir::new()?;
//! fixtures::write_video(dir.path(), "clip.mp4");
//!
//! let transcoder = MockTranscoder::new();
//! transcoder.set_default_info(MockTranscoder::video_info(90.0)).await;
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockTranscoder, RecordedJob};

/// Small files whose magic bytes identify them as media.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// JPEG SOI + JFIF APP0 marker.
    pub const JPEG_HEADER: &[u8] = &[
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01,
    ];

    /// ISO base media `ftyp` box with the `isom` brand.
    pub const MP4_HEADER: &[u8] = &[
        0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
        0x00, b'i', b's', b'o', b'm', b'i', b's', b'o', b'2',
    ];

    /// ID3v2.4 tag header.
    pub const MP3_HEADER: &[u8] = &[b'I', b'D', b'3', 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    fn write_with_header(dir: &Path, name: &str, header: &[u8], len: usize) -> PathBuf {
        let path = dir.join(name);
        let mut bytes = header.to_vec();
        // Deterministic filler so range reads have something to check
        bytes.extend((0..len.saturating_sub(header.len())).map(|i| (i % 251) as u8));
        std::fs::write(&path, bytes).expect("failed to write fixture");
        path
    }

    /// Writes a 2 KiB file that sniffs as `image/jpeg`.
    pub fn write_photo(dir: &Path, name: &str) -> PathBuf {
        write_with_header(dir, name, JPEG_HEADER, 2048)
    }

    /// Writes a 64 KiB file that sniffs as `video/mp4`.
    pub fn write_video(dir: &Path, name: &str) -> PathBuf {
        write_with_header(dir, name, MP4_HEADER, 64 * 1024)
    }

    /// Writes a 16 KiB file that sniffs as `audio/mpeg`.
    pub fn write_audio(dir: &Path, name: &str) -> PathBuf {
        write_with_header(dir, name, MP3_HEADER, 16 * 1024)
    }
}
