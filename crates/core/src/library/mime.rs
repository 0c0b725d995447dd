//! MIME detection: content sniffing with an extension fallback.

use std::path::Path;
use tokio::io::AsyncReadExt;

/// Bytes read from the start of a file for sniffing.
const SNIFF_LEN: usize = 8192;

/// Detects the MIME type of the file at `path`.
///
/// Returns `None` when neither the content nor the extension is recognized.
pub async fn detect_mime(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut header).await?;

    Ok(sniff(&header).or_else(|| guess_from_path(path)))
}

/// MIME type recognized from magic bytes.
pub fn sniff(header: &[u8]) -> Option<String> {
    infer::get(header).map(|kind| kind.mime_type().to_string())
}

/// MIME type guessed from the file extension.
pub fn guess_from_path(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_sniff_png() {
        assert_eq!(sniff(PNG_HEADER).as_deref(), Some("image/png"));
        assert_eq!(sniff(b"hello"), None);
    }

    #[test]
    fn test_guess_from_extension() {
        assert_eq!(guess_from_path(Path::new("a.mp3")).as_deref(), Some("audio/mpeg"));
        assert_eq!(guess_from_path(Path::new("a.unknownext")), None);
    }

    #[tokio::test]
    async fn test_content_wins_over_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("really-a-png.jpg");
        std::fs::write(&path, PNG_HEADER).unwrap();
        assert_eq!(detect_mime(&path).await.unwrap().as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_falls_back_to_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        assert_eq!(detect_mime(&path).await.unwrap().as_deref(), Some("video/mp4"));
    }
}
