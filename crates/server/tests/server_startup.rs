use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config pointing at `root`, with tools that do not exist
fn minimal_config(port: u16, root: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[library]
root = '{}'

[transcoder]
ffmpeg_path = "/nonexistent/ffmpeg"
ffprobe_path = "/nonexistent/ffprobe"
"#,
        port,
        root.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_mediashelf"))
        .env("MEDIASHELF_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Run the server to completion, expecting it to exit on its own
async fn run_to_exit(config_path: &str) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_mediashelf"))
            .env("MEDIASHELF_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, root.path()));

    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, root.path()));

    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let text = response.text().await.expect("Failed to read body");
    let json: serde_json::Value = serde_json::from_str(&text).expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert!(!text.contains(&root.path().display().to_string()));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_serves_originals_without_transcoder() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("notes.txt"), b"not media").unwrap();
    let config = write_config(&minimal_config(port, root.path()));

    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    // Unknown extensions are not indexed
    let client = Client::new();
    let response = client
        .get(format!(
            "http://127.0.0.1:{}/api/v1/file?path=notes.txt",
            port
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_to_exit("/nonexistent/config.toml").await;

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_library_root_exits_with_error() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    let missing = root.path().join("gone");
    let config = write_config(&minimal_config(port, &missing));

    let result = run_to_exit(config.path().to_str().unwrap()).await;

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_relative_library_root_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 18080

[library]
root = "media"
"#,
    );

    let result = run_to_exit(config.path().to_str().unwrap()).await;

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_toml_exits_with_error() {
    let config = write_config("this is not valid toml [[[");

    let result = run_to_exit(config.path().to_str().unwrap()).await;

    assert!(!result.status.success());
}
