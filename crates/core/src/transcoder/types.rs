//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video codec used when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// Animated GIF
    Gif,
    /// Still JPEG image
    Jpeg,
}

impl VideoCodec {
    /// Returns the ffmpeg codec name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Gif => "gif",
            Self::Jpeg => "mjpeg",
        }
    }
}

/// Audio codec used when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Advanced Audio Coding
    Aac,
    /// MPEG Audio Layer III
    Mp3,
}

impl AudioCodec {
    /// Returns the ffmpeg codec name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "libmp3lame",
        }
    }
}

/// Output container. Passed explicitly so outputs can live at any path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Mp4,
    Gif,
    Jpeg,
    Mp3,
}

impl Container {
    /// Returns the ffmpeg muxer name for this container.
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Jpeg => "image2",
            Self::Mp3 => "mp3",
        }
    }

    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Jpeg => "jpg",
            Self::Mp3 => "mp3",
        }
    }

    /// Returns the MIME type of files in this container.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Gif => "image/gif",
            Self::Jpeg => "image/jpeg",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Where the input comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSource {
    /// A single media file.
    File { path: PathBuf },
    /// Several files with identical stream layouts, played back to back.
    Concat { paths: Vec<PathBuf> },
}

/// Input side of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub source: InputSource,
    /// Seek to this position (seconds) before decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<f64>,
    /// Read at most this many seconds of input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl InputSpec {
    /// Reads the whole of one file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: InputSource::File { path: path.into() },
            seek: None,
            duration: None,
        }
    }

    /// Concatenates files without re-encoding them.
    pub fn concat(paths: Vec<PathBuf>) -> Self {
        Self {
            source: InputSource::Concat { paths },
            seek: None,
            duration: None,
        }
    }

    pub fn seek(mut self, secs: f64) -> Self {
        self.seek = Some(secs);
        self
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }
}

/// Video encoding parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEncode {
    pub codec: VideoCodec,
    /// Constant Rate Factor / quality scale, codec dependent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    /// Encoder speed preset (e.g. "veryfast").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Frame-rate ceiling. Never raises the native rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fps: Option<f64>,
    /// Width ceiling, height follows aspect ratio. Never upscales.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Emit exactly one frame.
    #[serde(default)]
    pub single_frame: bool,
    /// Move the index to the front of MP4 output.
    #[serde(default)]
    pub fast_start: bool,
}

impl VideoEncode {
    /// A single JPEG frame at most `max_width` pixels wide.
    pub fn frame(max_width: u32) -> Self {
        Self {
            codec: VideoCodec::Jpeg,
            crf: Some(4),
            preset: None,
            max_fps: None,
            max_width: Some(max_width),
            single_frame: true,
            fast_start: false,
        }
    }

    /// Browser-friendly H.264.
    pub fn h264() -> Self {
        Self {
            codec: VideoCodec::H264,
            crf: Some(23),
            preset: Some("veryfast".to_string()),
            max_fps: None,
            max_width: None,
            single_frame: false,
            fast_start: true,
        }
    }

    /// Animated GIF.
    pub fn gif() -> Self {
        Self {
            codec: VideoCodec::Gif,
            crf: None,
            preset: None,
            max_fps: None,
            max_width: None,
            single_frame: false,
            fast_start: false,
        }
    }

    pub fn max_width(mut self, width: Option<u32>) -> Self {
        self.max_width = width;
        self
    }

    pub fn max_fps(mut self, fps: Option<f64>) -> Self {
        self.max_fps = fps;
        self
    }
}

/// Video policy of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VideoSpec {
    /// Pass the stream through untouched.
    Copy,
    /// Drop video.
    Disabled,
    /// Re-encode.
    Encode(VideoEncode),
}

/// Audio policy of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "codec", rename_all = "snake_case")]
pub enum AudioSpec {
    Copy,
    Disabled,
    Encode(AudioCodec),
}

/// Output side of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub container: Container,
}

impl OutputSpec {
    pub fn new(path: impl Into<PathBuf>, container: Container) -> Self {
        Self {
            path: path.into(),
            container,
        }
    }
}

/// A declarative conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub input: InputSpec,
    pub video: VideoSpec,
    pub audio: AudioSpec,
    pub output: OutputSpec,
}

/// Descriptive tags found in a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
}

impl MediaTags {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Information about a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container format (e.g., "mov", "matroska").
    pub format: String,
    /// Duration in seconds, if the container or a stream reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Video/image width (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Video/image height (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Video frame rate (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Video codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    /// Audio codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(default, skip_serializing_if = "MediaTags::is_empty")]
    pub tags: MediaTags,
}

/// Parses a frame rate like "24000/1001", "30/1" or "25".
///
/// Returns `None` for zero denominators, zero rates and non-finite values.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
