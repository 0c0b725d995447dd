//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{
    parse_frame_rate, AudioSpec, InputSource, MediaInfo, MediaTags, TranscodeJob, VideoCodec,
    VideoEncode, VideoSpec,
};

/// Keep this many bytes of stderr for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Path of the concat list written for a job, if it needs one.
    fn concat_list_path(job: &TranscodeJob) -> Option<PathBuf> {
        match job.input.source {
            InputSource::Concat { .. } => {
                let mut name = job.output.path.as_os_str().to_owned();
                name.push(".concat.txt");
                Some(PathBuf::from(name))
            }
            InputSource::File { .. } => None,
        }
    }

    /// Renders the body of an ffmpeg concat list.
    fn concat_list(paths: &[PathBuf]) -> String {
        paths
            .iter()
            .map(|p| {
                let escaped = p.to_string_lossy().replace('\'', r"'\''");
                format!("file '{}'\n", escaped)
            })
            .collect()
    }

    /// Builds the video filter chain for an encode.
    fn video_filters(encode: &VideoEncode) -> Option<String> {
        let mut filters = Vec::new();

        if let Some(fps) = encode.max_fps {
            filters.push(format!("fps={}", format_secs(fps)));
        }

        if let Some(width) = encode.max_width {
            // -2 keeps the height even, which yuv420p requires
            filters.push(format!("scale='min({},iw)':-2", width));
        }

        match encode.codec {
            VideoCodec::H264 => filters.push("format=yuv420p".to_string()),
            VideoCodec::Gif => {
                filters.push("split[a][b];[a]palettegen[p];[b][p]paletteuse".to_string())
            }
            VideoCodec::Jpeg => {}
        }

        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }

    /// Builds the full ffmpeg argument list for a job.
    fn build_args(&self, job: &TranscodeJob, concat_list: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
        ];

        // Input-side seek and trim keep long files fast
        if let Some(seek) = job.input.seek {
            args.extend(["-ss".to_string(), format_secs(seek)]);
        }
        if let Some(duration) = job.input.duration {
            args.extend(["-t".to_string(), format_secs(duration)]);
        }

        match (&job.input.source, concat_list) {
            (InputSource::Concat { .. }, Some(list)) => {
                args.extend([
                    "-f".to_string(),
                    "concat".to_string(),
                    "-safe".to_string(),
                    "0".to_string(),
                    "-i".to_string(),
                    list.to_string_lossy().to_string(),
                ]);
            }
            (InputSource::File { path }, _) => {
                args.extend(["-i".to_string(), path.to_string_lossy().to_string()]);
            }
            (InputSource::Concat { paths }, None) => {
                // No list file: fall back to the first segment
                if let Some(first) = paths.first() {
                    args.extend(["-i".to_string(), first.to_string_lossy().to_string()]);
                }
            }
        }

        match &job.video {
            VideoSpec::Copy => args.extend(["-c:v".to_string(), "copy".to_string()]),
            VideoSpec::Disabled => args.push("-vn".to_string()),
            VideoSpec::Encode(encode) => {
                args.extend(["-c:v".to_string(), encode.codec.ffmpeg_codec().to_string()]);

                match encode.codec {
                    VideoCodec::H264 => {
                        if let Some(crf) = encode.crf {
                            args.extend(["-crf".to_string(), crf.to_string()]);
                        }
                        if let Some(ref preset) = encode.preset {
                            args.extend(["-preset".to_string(), preset.clone()]);
                        }
                    }
                    VideoCodec::Jpeg => {
                        if let Some(q) = encode.crf {
                            args.extend(["-q:v".to_string(), q.to_string()]);
                        }
                    }
                    VideoCodec::Gif => {}
                }

                if let Some(filters) = Self::video_filters(encode) {
                    args.extend(["-vf".to_string(), filters]);
                }

                if encode.single_frame {
                    args.extend(["-frames:v".to_string(), "1".to_string()]);
                }

                if encode.fast_start {
                    args.extend(["-movflags".to_string(), "+faststart".to_string()]);
                }
            }
        }

        match &job.audio {
            AudioSpec::Copy => args.extend(["-c:a".to_string(), "copy".to_string()]),
            AudioSpec::Disabled => args.push("-an".to_string()),
            AudioSpec::Encode(codec) => {
                args.extend(["-c:a".to_string(), codec.ffmpeg_codec().to_string()])
            }
        }

        // Subtitles and data streams never survive into derived files
        args.extend(["-sn".to_string(), "-dn".to_string()]);

        if let Some(threads) = self.config.threads {
            args.extend(["-threads".to_string(), threads.to_string()]);
        }
        args.extend(self.config.extra_args.iter().cloned());

        args.extend([
            "-f".to_string(),
            job.output.container.ffmpeg_format().to_string(),
            job.output.path.to_string_lossy().to_string(),
        ]);

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(output: &str) -> Result<MediaInfo, TranscodeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            #[serde(default)]
            tags: HashMap<String, String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            avg_frame_rate: Option<String>,
            r_frame_rate: Option<String>,
            duration: Option<String>,
            #[serde(default)]
            disposition: HashMap<String, i64>,
            #[serde(default)]
            tags: HashMap<String, String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscodeError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        // Cover art shows up as a video stream with attached_pic set
        let video_stream = probe.streams.iter().find(|s| {
            s.codec_type == "video" && s.disposition.get("attached_pic").copied() != Some(1)
        });
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .or_else(|| video_stream.and_then(|s| s.duration.as_deref()))
            .or_else(|| audio_stream.and_then(|s| s.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite());

        let fps = video_stream.and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
        });

        // Container tags win over stream tags; keys are case-insensitive
        let mut tags: HashMap<String, String> = HashMap::new();
        for stream in [audio_stream, video_stream].into_iter().flatten() {
            for (k, v) in &stream.tags {
                tags.insert(k.to_lowercase(), v.clone());
            }
        }
        for (k, v) in &probe.format.tags {
            tags.insert(k.to_lowercase(), v.clone());
        }

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            format: format_name.to_string(),
            duration_secs,
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
            fps,
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            tags: MediaTags {
                artist: tags.get("artist").cloned(),
                album: tags.get("album").cloned(),
                genre: tags.get("genre").cloned(),
                title: tags.get("title").cloned(),
                track: tags.get("track").and_then(|t| parse_track(t)),
            },
        })
    }
}

/// Parses "3" or "3/12" into 3.
fn parse_track(raw: &str) -> Option<u32> {
    raw.split('/').next()?.trim().parse().ok()
}

/// Formats seconds for the command line with millisecond precision.
fn format_secs(secs: f64) -> String {
    let rounded = (secs * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

fn stderr_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    let start = (start..text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());
    Some(text[start..].to_string())
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(TranscodeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&stdout)
    }

    async fn convert(&self, job: TranscodeJob) -> Result<(), TranscodeError> {
        let start = Instant::now();

        if let InputSource::File { ref path } = job.input.source {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(TranscodeError::InputNotFound { path: path.clone() });
            }
        }

        let concat_list = Self::concat_list_path(&job);
        if let (Some(list), InputSource::Concat { paths }) = (&concat_list, &job.input.source) {
            tokio::fs::write(list, Self::concat_list(paths)).await?;
        }

        let args = self.build_args(&job, concat_list.as_deref());
        debug!(args = ?args, "running ffmpeg");

        let result = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        if let Some(ref list) = concat_list {
            let _ = tokio::fs::remove_file(list).await;
        }

        let output = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscodeError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                }
            } else {
                TranscodeError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(TranscodeError::conversion_failed(
                format!("FFmpeg exited with code: {:?}", output.status.code()),
                stderr_tail(&output.stderr),
            ));
        }

        if !tokio::fs::try_exists(&job.output.path).await.unwrap_or(false) {
            return Err(TranscodeError::OutputMissing {
                path: job.output.path.clone(),
            });
        }

        debug!(
            output = %job.output.path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );
        Ok(())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        Ok(())
    }
}
