use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the ffmpeg and ffprobe binaries are invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Passed to `-loglevel`. Only errors matter since stderr is kept for failures.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Encoder threads per job. Several jobs run at once, so leaving this
    /// unset lets each one grab every core.
    #[serde(default)]
    pub threads: Option<u32>,

    /// Extra output options appended to every ffmpeg run.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            threads: None,
            extra_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let config: TranscoderConfig = toml::from_str("").unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.log_level, "error");
        assert_eq!(config.threads, None);
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config: TranscoderConfig = toml::from_str(
            r#"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
threads = 2
extra_args = ["-map_metadata", "-1"]
"#,
        )
        .unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.extra_args, vec!["-map_metadata", "-1"]);
    }
}
