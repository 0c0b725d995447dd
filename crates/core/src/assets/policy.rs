//! Fixed encoding policy for each derived asset.
//!
//! Caps on width and frame rate are ceilings: the source's own value is used
//! when it is lower, so nothing is ever upscaled.

use std::path::{Path, PathBuf};

use crate::config::MediaKind;
use crate::library::SourceMedia;
use crate::transcoder::{
    AudioCodec, AudioSpec, Container, InputSpec, OutputSpec, TranscodeJob, VideoEncode, VideoSpec,
};

use super::request::{AssetRequest, CaptureKind, CaptureSpec, ConvertTarget, Quality};

/// Width of thumbnails.
pub const THUMBNAIL_WIDTH: u32 = 500;
/// Width of montage frames.
pub const MONTAGE_WIDTH: u32 = 240;
/// Width of preview snippets.
pub const PREVIEW_WIDTH: u32 = 480;
/// Upper bound on montage frames per video.
pub const MONTAGE_MAX_FRAMES: u32 = 200;
/// Minimum spacing of montage frames.
pub const MONTAGE_MIN_STEP: u32 = 2;
/// Number of segments stitched into a preview.
pub const PREVIEW_SEGMENTS: u32 = 8;
/// Length of each preview segment.
pub const PREVIEW_SEGMENT_SECS: f64 = 3.0;

/// Seconds between montage frames.
pub fn montage_step(duration: f64) -> u32 {
    let per_frame = (duration / MONTAGE_MAX_FRAMES as f64).ceil();
    if per_frame.is_finite() && per_frame > MONTAGE_MIN_STEP as f64 {
        per_frame as u32
    } else {
        MONTAGE_MIN_STEP
    }
}

/// Timestamps of every montage frame of a video.
pub fn montage_timestamps(duration: f64) -> Vec<u32> {
    let step = montage_step(duration);
    (0..MONTAGE_MAX_FRAMES)
        .map(|i| i * step)
        .take_while(|t| (*t as f64) < duration)
        .collect()
}

/// Whether `secs` is on the montage grid of a video.
pub fn is_montage_timestamp(duration: f64, secs: u32) -> bool {
    let step = montage_step(duration);
    secs % step == 0 && secs / step < MONTAGE_MAX_FRAMES && (secs as f64) < duration
}

/// Resolution and frame-rate ceilings of a quality tier.
pub fn quality_caps(quality: Quality, kind: CaptureKind) -> (Option<u32>, Option<f64>) {
    let (width, fps) = match quality {
        Quality::Low => (Some(480), Some(15.0)),
        Quality::Medium => (Some(720), Some(24.0)),
        Quality::High => (Some(1080), Some(30.0)),
        Quality::Original => (None, None),
    };
    match kind {
        CaptureKind::Mp4 => (width, fps),
        CaptureKind::Gif => (
            Some(width.map_or(480, |w| w.min(480))),
            Some(fps.map_or(12.0, |f: f64| f.min(12.0))),
        ),
    }
}

/// The lower of the source's width and a cap.
pub fn cap_width(source: Option<u32>, cap: Option<u32>) -> Option<u32> {
    match (source, cap) {
        (Some(s), Some(c)) => Some(s.min(c)),
        (_, cap) => cap,
    }
}

/// The lower of the source's frame rate and a cap.
pub fn cap_fps(source: Option<f64>, cap: Option<f64>) -> Option<f64> {
    match (source, cap) {
        (Some(s), Some(c)) => Some(s.min(c)),
        (_, cap) => cap,
    }
}

/// Start times of the preview segments, or `None` for a single encode.
pub fn preview_segments(duration: f64) -> Option<Vec<f64>> {
    let segments = PREVIEW_SEGMENTS as f64;
    if duration <= segments * PREVIEW_SEGMENT_SECS {
        return None;
    }
    let slice = duration / segments;
    Some(
        (0..PREVIEW_SEGMENTS)
            .map(|i| (slice * i as f64 + (slice - PREVIEW_SEGMENT_SECS) / 2.0).max(0.0))
            .collect(),
    )
}

/// Job producing a single-output asset at `output`.
///
/// Previews longer than one segment set are built by [`preview_segment_job`]
/// and [`concat_job`] instead.
pub fn job_for(source: &SourceMedia, request: &AssetRequest, output: &Path) -> TranscodeJob {
    let container = request.container();
    match request {
        AssetRequest::Thumbnail => {
            let mut input = InputSpec::file(&source.abs_path);
            if source.kind == MediaKind::Video {
                input = input.seek(source.duration * 0.5);
            }
            TranscodeJob {
                input,
                video: VideoSpec::Encode(frame(source, THUMBNAIL_WIDTH)),
                audio: AudioSpec::Disabled,
                output: OutputSpec::new(output, container),
            }
        }
        AssetRequest::MontageFrame(secs) => TranscodeJob {
            input: InputSpec::file(&source.abs_path).seek(*secs as f64),
            video: VideoSpec::Encode(frame(source, MONTAGE_WIDTH)),
            audio: AudioSpec::Disabled,
            output: OutputSpec::new(output, container),
        },
        AssetRequest::Preview => TranscodeJob {
            input: InputSpec::file(&source.abs_path),
            video: VideoSpec::Encode(preview_encode(source)),
            audio: AudioSpec::Disabled,
            output: OutputSpec::new(output, container),
        },
        AssetRequest::Capture(spec) => capture_job(source, spec, output),
        AssetRequest::Convert(target) => convert_job(source, *target, output),
    }
}

fn frame(source: &SourceMedia, width: u32) -> VideoEncode {
    let width = cap_width(source.width, Some(width)).unwrap_or(width);
    VideoEncode::frame(width)
}

fn preview_encode(source: &SourceMedia) -> VideoEncode {
    VideoEncode::h264().max_width(cap_width(source.width, Some(PREVIEW_WIDTH)))
}

fn capture_job(source: &SourceMedia, spec: &CaptureSpec, output: &Path) -> TranscodeJob {
    let spec = spec.normalized();
    let (max_width, max_fps) = quality_caps(spec.quality, spec.kind);
    let encode = match spec.kind {
        CaptureKind::Mp4 => VideoEncode::h264(),
        CaptureKind::Gif => VideoEncode::gif(),
    }
    .max_width(cap_width(source.width, max_width))
    .max_fps(cap_fps(source.fps, max_fps));

    let audio = if spec.silent || !source.has_audio {
        AudioSpec::Disabled
    } else {
        AudioSpec::Encode(AudioCodec::Aac)
    };

    let container = match spec.kind {
        CaptureKind::Mp4 => Container::Mp4,
        CaptureKind::Gif => Container::Gif,
    };

    TranscodeJob {
        input: InputSpec::file(&source.abs_path)
            .seek(spec.start)
            .duration(spec.duration()),
        video: VideoSpec::Encode(encode),
        audio,
        output: OutputSpec::new(output, container),
    }
}

fn convert_job(source: &SourceMedia, target: ConvertTarget, output: &Path) -> TranscodeJob {
    let input = InputSpec::file(&source.abs_path);
    match target {
        ConvertTarget::Mp4 => TranscodeJob {
            input,
            video: VideoSpec::Encode(VideoEncode::h264()),
            audio: if source.has_audio {
                AudioSpec::Encode(AudioCodec::Aac)
            } else {
                AudioSpec::Disabled
            },
            output: OutputSpec::new(output, Container::Mp4),
        },
        ConvertTarget::Mp3 => TranscodeJob {
            input,
            video: VideoSpec::Disabled,
            audio: AudioSpec::Encode(AudioCodec::Mp3),
            output: OutputSpec::new(output, Container::Mp3),
        },
    }
}

/// One silent preview segment starting at `start`.
pub fn preview_segment_job(source: &SourceMedia, start: f64, output: &Path) -> TranscodeJob {
    TranscodeJob {
        input: InputSpec::file(&source.abs_path)
            .seek(start)
            .duration(PREVIEW_SEGMENT_SECS),
        video: VideoSpec::Encode(preview_encode(source)),
        audio: AudioSpec::Disabled,
        output: OutputSpec::new(output, Container::Mp4),
    }
}

/// Lossless concatenation of segments with identical stream layouts.
pub fn concat_job(segments: Vec<PathBuf>, output: &Path) -> TranscodeJob {
    TranscodeJob {
        input: InputSpec::concat(segments),
        video: VideoSpec::Copy,
        audio: AudioSpec::Disabled,
        output: OutputSpec::new(output, Container::Mp4),
    }
}
