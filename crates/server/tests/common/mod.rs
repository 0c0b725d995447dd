//! Common test utilities for in-process API testing.
//!
//! `TestFixture` builds a small media library in a temporary directory and
//! serves it through the real router, with `MockTranscoder` standing in for
//! ffmpeg/ffprobe.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediashelf_core::testing::MockTranscoder;
use mediashelf_core::{Config, LibraryConfig, ServerConfig, TranscoderConfig};
use mediashelf_server::state::AppState;

/// Re-export fixtures for test convenience
pub use mediashelf_core::testing::fixtures;

/// Test fixture serving a temporary library.
///
/// The library looks like:
///
/// ```text
/// album/song1.mp3
/// album/song2.mp3
/// beach.jpg
/// clips/clip.mp4
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Application state behind the router
    pub state: Arc<AppState>,
    /// Mock transcoder - configure probe results and failures
    pub transcoder: Arc<MockTranscoder>,
    /// Library root
    pub temp_dir: TempDir,
}

/// JSON response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Raw response from a test request
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl TestFixture {
    /// Create a fixture with the default library.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        let album = root.join("album");
        let clips = root.join("clips");
        std::fs::create_dir_all(&album).expect("Failed to create album dir");
        std::fs::create_dir_all(&clips).expect("Failed to create clips dir");
        fixtures::write_audio(&album, "song1.mp3");
        fixtures::write_audio(&album, "song2.mp3");
        fixtures::write_photo(root, "beach.jpg");
        fixtures::write_video(&clips, "clip.mp4");

        let mut library = LibraryConfig::new(root);
        library.concurrency = Some(2);
        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            library,
            transcoder: TranscoderConfig::default(),
        };

        let transcoder = Arc::new(MockTranscoder::new());
        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&transcoder) as Arc<dyn mediashelf_core::Transcoder>,
        ));
        let router = mediashelf_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            transcoder,
            temp_dir,
        }
    }

    /// Library root directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a library file.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// List a directory through `POST /api/v1/files`.
    pub async fn list(&self, query: Value) -> TestResponse {
        self.post("/api/v1/files", query).await
    }

    /// Send a GET request with extra headers and keep the raw body.
    pub async fn get_raw(&self, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
