//! Range-aware file responses.

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use futures::TryStreamExt;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::ApiError;

/// Inclusive byte span of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the span.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Not of the form `bytes=start-end`.
    Malformed,
    /// Well formed, but starts at or past the end of the file.
    Unsatisfiable,
}

/// Parses a `Range` header of the form `bytes=start-end` (end optional)
/// against a file of `size` bytes. An end past the file is clamped.
pub fn parse_range(value: &str, size: u64) -> Result<ByteRange, RangeError> {
    let spec = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;
    let (start, end) = spec.split_once('-').ok_or(RangeError::Malformed)?;

    let start = parse_offset(start)?;
    let end = match end.trim() {
        "" => None,
        end => Some(parse_offset(end)?),
    };

    if let Some(end) = end {
        if end < start {
            return Err(RangeError::Malformed);
        }
    }
    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }

    let last = size - 1;
    Ok(ByteRange {
        start,
        end: end.map_or(last, |end| end.min(last)),
    })
}

fn parse_offset(raw: &str) -> Result<u64, RangeError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    raw.parse().map_err(|_| RangeError::Malformed)
}

/// Replaces everything but ASCII alphanumerics and `._-` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// A file to send.
#[derive(Debug, Clone)]
pub struct FileResponse<'a> {
    pub path: &'a Path,
    pub size: u64,
    pub mime: &'a str,
    pub name: Option<&'a str>,
}

impl FileResponse<'_> {
    /// Streams the file, or the span named by the request's `Range` header.
    pub async fn send(self, headers: &HeaderMap) -> Result<Response, ApiError> {
        let range = match headers.get(header::RANGE) {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("malformed Range header"))?;
                match parse_range(value, self.size) {
                    Ok(range) => Some(range),
                    Err(RangeError::Malformed) => {
                        return Err(ApiError::bad_request(format!(
                            "malformed Range header: {}",
                            value
                        )))
                    }
                    Err(RangeError::Unsatisfiable) => {
                        return Err(ApiError::RangeNotSatisfiable { size: self.size })
                    }
                }
            }
            None => None,
        };

        let mut file = tokio::fs::File::open(self.path).await?;

        let mut builder = Response::builder()
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_TYPE, self.mime);
        if let Some(name) = self.name {
            builder = builder.header(
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", sanitize_filename(name)),
            );
        }

        let (builder, start, len) = match range {
            Some(range) => (
                builder.status(StatusCode::PARTIAL_CONTENT).header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, range.end, self.size),
                ),
                range.start,
                range.len(),
            ),
            None => (builder.status(StatusCode::OK), 0, self.size),
        };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        let path = self.path.display().to_string();
        let stream = ReaderStream::new(file.take(len)).inspect_err(move |e| {
            debug!(path = %path, "file stream ended early: {}", e);
        });

        builder
            .header(header::CONTENT_LENGTH, len)
            .body(Body::from_stream(stream))
            .map_err(|e| ApiError::internal(e.to_string()))
    }
}
