use std::collections::HashMap;

use super::types::{normalize_extension, Config};
use super::ConfigError;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Library root is absolute
/// - Concurrency, when set, is at least 1
/// - No extension belongs to two media kinds
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let library = &config.library;
    if !library.root.is_absolute() {
        return Err(ConfigError::ValidationError(format!(
            "library.root must be an absolute path: {}",
            library.root.display()
        )));
    }

    if library.concurrency == Some(0) {
        return Err(ConfigError::ValidationError(
            "library.concurrency cannot be 0".to_string(),
        ));
    }

    let mut seen: HashMap<String, &str> = HashMap::new();
    let kinds = [
        ("audio", &library.audio_extensions),
        ("photo", &library.photo_extensions),
        ("video", &library.video_extensions),
    ];
    for (kind, extensions) in kinds {
        for ext in extensions {
            let ext = normalize_extension(ext);
            // Repeats within one kind are harmless
            match seen.insert(ext.clone(), kind) {
                Some(other) if other != kind => {
                    return Err(ConfigError::ValidationError(format!(
                        "extension '{}' is configured for both {} and {}",
                        ext, other, kind
                    )));
                }
                _ => {}
            }
        }
    }

    Ok(())
}
