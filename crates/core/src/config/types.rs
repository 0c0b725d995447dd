use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub library: LibraryConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Library configuration: what to index and where derived assets live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root directory of the media library.
    pub root: PathBuf,
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
    #[serde(default = "default_photo_extensions")]
    pub photo_extensions: Vec<String>,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    /// Index dotfiles (and Windows hidden files).
    #[serde(default)]
    pub include_hidden: bool,
    /// Keep sidecar directories here instead of next to the source files.
    #[serde(default)]
    pub previews_dir: Option<PathBuf>,
    /// Where intermediate files (preview segments) are written.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Maximum concurrent external tool invocations. Defaults to the CPU count.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Walk the whole tree at startup instead of loading directories on first access.
    #[serde(default)]
    pub eager_index: bool,
}

impl LibraryConfig {
    /// Creates a config for `root` with default extension sets.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            audio_extensions: default_audio_extensions(),
            photo_extensions: default_photo_extensions(),
            video_extensions: default_video_extensions(),
            include_hidden: false,
            previews_dir: None,
            scratch_dir: None,
            concurrency: None,
            eager_index: false,
        }
    }

    /// Classifies a file extension (case-insensitive, with or without dot).
    pub fn classify_extension(&self, ext: &str) -> Option<MediaKind> {
        let ext = normalize_extension(ext);
        let matches = |list: &[String]| list.iter().any(|e| normalize_extension(e) == ext);
        if matches(&self.video_extensions) {
            Some(MediaKind::Video)
        } else if matches(&self.audio_extensions) {
            Some(MediaKind::Audio)
        } else if matches(&self.photo_extensions) {
            Some(MediaKind::Photo)
        } else {
            None
        }
    }

    /// Effective concurrency limit.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Kind of media file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Audio,
    Video,
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

fn to_strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_audio_extensions() -> Vec<String> {
    to_strings(&["mp3", "m4a", "flac", "ogg", "opus", "wav"])
}

fn default_photo_extensions() -> Vec<String> {
    to_strings(&["jpg", "jpeg", "png", "gif", "webp", "heic"])
}

fn default_video_extensions() -> Vec<String> {
    to_strings(&["mp4", "m4v", "mkv", "mov", "webm", "avi"])
}

/// Sanitized config for API responses (filesystem layout redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub library: SanitizedLibraryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLibraryConfig {
    pub audio_extensions: Vec<String>,
    pub photo_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub include_hidden: bool,
    pub previews_dir_configured: bool,
    pub concurrency: usize,
    pub eager_index: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let library = &config.library;
        Self {
            server: config.server.clone(),
            library: SanitizedLibraryConfig {
                audio_extensions: library.audio_extensions.clone(),
                photo_extensions: library.photo_extensions.clone(),
                video_extensions: library.video_extensions.clone(),
                include_hidden: library.include_hidden,
                previews_dir_configured: library.previews_dir.is_some(),
                concurrency: library.effective_concurrency(),
                eager_index: library.eager_index,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let toml = r#"
[library]
root = "/srv/media"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert!(!config.library.include_hidden);
        assert!(config.library.video_extensions.contains(&"mkv".to_string()));
        assert_eq!(config.transcoder.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_deserialize_missing_library_fails() {
        let result: Result<Config, _> = toml::from_str("[server]\nport = 8080\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_classify_extension_case_insensitive() {
        let library = LibraryConfig::new("/srv/media");
        assert_eq!(library.classify_extension("MKV"), Some(MediaKind::Video));
        assert_eq!(library.classify_extension(".flac"), Some(MediaKind::Audio));
        assert_eq!(library.classify_extension("Jpeg"), Some(MediaKind::Photo));
        assert_eq!(library.classify_extension("txt"), None);
    }

    #[test]
    fn test_custom_extensions() {
        let toml = r#"
[library]
root = "/srv/media"
video_extensions = [".TS"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.library.classify_extension("ts"), Some(MediaKind::Video));
        assert_eq!(config.library.classify_extension("mp4"), None);
    }

    #[test]
    fn test_effective_concurrency() {
        let mut library = LibraryConfig::new("/srv/media");
        library.concurrency = Some(3);
        assert_eq!(library.effective_concurrency(), 3);
        library.concurrency = None;
        assert!(library.effective_concurrency() >= 1);
    }

    #[test]
    fn test_sanitized_config() {
        let mut library = LibraryConfig::new("/srv/media");
        library.previews_dir = Some(PathBuf::from("/var/cache/mediashelf"));
        library.concurrency = Some(2);
        let config = Config {
            server: ServerConfig::default(),
            library,
            transcoder: TranscoderConfig::default(),
        };
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.library.previews_dir_configured);
        assert_eq!(sanitized.library.concurrency, 2);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("/srv/media"));
        assert!(!json.contains("/var/cache"));
    }
}
