//! Derived-asset requests and their validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MediaKind;
use crate::library::SourceMedia;
use crate::transcoder::Container;

use super::error::AssetError;
use super::policy;

/// Captures must be shorter than this many seconds.
pub const MAX_CAPTURE_SECS: f64 = 60.0;

/// Output format of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Mp4,
    Gif,
}

/// Resolution and frame-rate ceiling of a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Original,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Original => "original",
        })
    }
}

/// Target of a browser-compatibility conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertTarget {
    Mp4,
    Mp3,
}

/// A time range export of a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSpec {
    pub start: f64,
    pub end: f64,
    pub kind: CaptureKind,
    pub quality: Quality,
    pub silent: bool,
}

impl CaptureSpec {
    /// Rounds times to milliseconds. GIFs are always silent.
    pub fn normalized(self) -> Self {
        // Adding 0.0 turns -0.0 into 0.0
        let ms = |secs: f64| (secs * 1000.0).round() / 1000.0 + 0.0;
        Self {
            start: ms(self.start),
            end: ms(self.end),
            silent: self.silent || self.kind == CaptureKind::Gif,
            ..self
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A derived asset of one source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssetRequest {
    Thumbnail,
    Preview,
    /// Montage frame at this many seconds.
    MontageFrame(u32),
    Capture(CaptureSpec),
    Convert(ConvertTarget),
}

impl AssetRequest {
    /// File name of the asset inside the sidecar directory.
    pub fn file_name(&self) -> String {
        match self {
            Self::Thumbnail => "thumbnail.jpg".to_string(),
            Self::Preview => "preview.mp4".to_string(),
            Self::MontageFrame(secs) => format!("montageshot{}.jpg", secs),
            Self::Capture(spec) => {
                let spec = spec.normalized();
                let mut name = format!(
                    "capture.{}-{}.{}.{}",
                    spec.start,
                    spec.end,
                    spec.quality,
                    self.container().extension()
                );
                if spec.silent && spec.kind == CaptureKind::Mp4 {
                    name.push_str(".silent");
                }
                name
            }
            Self::Convert(_) => format!("converted.{}", self.container().extension()),
        }
    }

    /// Container the asset is written in.
    pub fn container(&self) -> Container {
        match self {
            Self::Thumbnail | Self::MontageFrame(_) => Container::Jpeg,
            Self::Preview => Container::Mp4,
            Self::Capture(spec) => match spec.kind {
                CaptureKind::Mp4 => Container::Mp4,
                CaptureKind::Gif => Container::Gif,
            },
            Self::Convert(ConvertTarget::Mp4) => Container::Mp4,
            Self::Convert(ConvertTarget::Mp3) => Container::Mp3,
        }
    }

    pub fn mime(&self) -> &'static str {
        self.container().mime()
    }

    /// Checks the request against the source before anything is generated.
    pub fn validate(&self, source: &SourceMedia) -> Result<(), AssetError> {
        match (self, source.kind) {
            (Self::Thumbnail, MediaKind::Photo | MediaKind::Video) => Ok(()),
            (Self::Thumbnail, MediaKind::Audio) => {
                Err(AssetError::unsupported("audio files have no thumbnail"))
            }

            (Self::Preview, MediaKind::Video) => Ok(()),
            (Self::MontageFrame(secs), MediaKind::Video) => {
                if policy::is_montage_timestamp(source.duration, *secs) {
                    Ok(())
                } else {
                    Err(AssetError::NotFound(format!("no montage frame at {}s", secs)))
                }
            }
            (Self::Capture(spec), MediaKind::Video) => validate_capture(spec, source.duration),
            (Self::Preview | Self::MontageFrame(_) | Self::Capture(_), _) => Err(
                AssetError::unsupported(format!("{} is only available for videos", self.label())),
            ),

            (Self::Convert(ConvertTarget::Mp4), MediaKind::Video)
            | (Self::Convert(ConvertTarget::Mp3), MediaKind::Audio) => Ok(()),
            (Self::Convert(target), _) => Err(AssetError::unsupported(format!(
                "cannot convert a {} file to {}",
                kind_name(source.kind),
                Container::from(*target).extension()
            ))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Preview => "preview",
            Self::MontageFrame(_) => "montage",
            Self::Capture(_) => "capture",
            Self::Convert(_) => "conversion",
        }
    }
}

impl From<ConvertTarget> for Container {
    fn from(target: ConvertTarget) -> Self {
        match target {
            ConvertTarget::Mp4 => Container::Mp4,
            ConvertTarget::Mp3 => Container::Mp3,
        }
    }
}

fn kind_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Audio => "audio",
        MediaKind::Video => "video",
    }
}

fn validate_capture(spec: &CaptureSpec, duration: f64) -> Result<(), AssetError> {
    let spec = spec.normalized();
    if !spec.start.is_finite() || !spec.end.is_finite() {
        return Err(AssetError::invalid("capture times must be finite"));
    }
    if spec.start < 0.0 {
        return Err(AssetError::invalid("capture start is negative"));
    }
    if spec.start > duration {
        return Err(AssetError::invalid(format!(
            "capture start {} is past the end of the file ({})",
            spec.start, duration
        )));
    }
    if spec.end > duration {
        return Err(AssetError::invalid(format!(
            "capture end {} is past the end of the file ({})",
            spec.end, duration
        )));
    }
    if spec.end <= spec.start {
        return Err(AssetError::invalid("capture end must be after its start"));
    }
    if spec.duration() >= MAX_CAPTURE_SECS {
        return Err(AssetError::invalid(format!(
            "captures must be shorter than {} seconds",
            MAX_CAPTURE_SECS
        )));
    }
    Ok(())
}
