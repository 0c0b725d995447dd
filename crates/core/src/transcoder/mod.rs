//! Transcoder module: probing and converting media with an external tool.
//!
//! The `Transcoder` trait is the seam between the library core and the
//! external media tool. Jobs are declarative (`TranscodeJob`): an input with
//! optional seek/duration, a video policy, an audio policy and an output
//! container. `FfmpegTranscoder` turns them into ffmpeg invocations.
//!
//! # Example
//!
//! ```ignore
//! use mediashelf_core::transcoder::*;
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! let info = transcoder.probe(Path::new("/media/clip.mkv")).await?;
//!
//! let job = TranscodeJob {
//!     input: InputSpec::file("/media/clip.mkv").seek(info.duration_secs.unwrap_or(0.0) / 2.0),
//!     video: VideoSpec::Encode(VideoEncode::frame(500)),
//!     audio: AudioSpec::Disabled,
//!     output: OutputSpec::new("/tmp/thumb.jpg", Container::Jpeg),
//! };
//! transcoder.convert(job).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{
    parse_frame_rate, AudioCodec, AudioSpec, Container, InputSource, InputSpec, MediaInfo,
    MediaTags, OutputSpec, TranscodeJob, VideoCodec, VideoEncode, VideoSpec,
};
