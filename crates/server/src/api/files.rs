use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use mediashelf_core::library::list_files as list_directory;
use mediashelf_core::{
    AssetRequest, CaptureKind, CaptureSpec, ConvertTarget, ListQuery, ListResponse, Quality,
};

use super::error::ApiError;
use super::response::FileResponse;
use crate::state::AppState;

/// List a directory
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Json(query): Json<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let library = state.library().await;
    let dir = library.resolve_directory(query.path.as_slice()).await?;
    let listing = list_directory(library.indexer(), dir, &query).await?;
    Ok(Json(listing))
}

/// Query parameters of `GET /file`. At most one derived-asset selector
/// may be present.
#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub path: String,
    #[serde(default)]
    pub thumbnail: bool,
    #[serde(default)]
    pub preview: bool,
    pub montage_frame: Option<u32>,
    pub capture_start: Option<f64>,
    pub capture_end: Option<f64>,
    pub capture_type: Option<CaptureKind>,
    pub capture_quality: Option<Quality>,
    #[serde(default)]
    pub capture_silent: bool,
    pub convert: Option<ConvertTarget>,
}

impl FileParams {
    /// The derived asset asked for, if any.
    pub fn asset_request(&self) -> Result<Option<AssetRequest>, ApiError> {
        let capture = self.capture_start.is_some()
            || self.capture_end.is_some()
            || self.capture_type.is_some()
            || self.capture_quality.is_some()
            || self.capture_silent;

        let selected = [
            self.thumbnail,
            self.preview,
            self.montage_frame.is_some(),
            capture,
            self.convert.is_some(),
        ]
        .iter()
        .filter(|s| **s)
        .count();
        if selected > 1 {
            return Err(ApiError::bad_request(
                "request at most one of thumbnail, preview, montage_frame, capture or convert",
            ));
        }

        if self.thumbnail {
            return Ok(Some(AssetRequest::Thumbnail));
        }
        if self.preview {
            return Ok(Some(AssetRequest::Preview));
        }
        if let Some(secs) = self.montage_frame {
            return Ok(Some(AssetRequest::MontageFrame(secs)));
        }
        if let Some(target) = self.convert {
            return Ok(Some(AssetRequest::Convert(target)));
        }
        if capture {
            let (Some(start), Some(end)) = (self.capture_start, self.capture_end) else {
                return Err(ApiError::bad_request(
                    "capture needs both capture_start and capture_end",
                ));
            };
            return Ok(Some(AssetRequest::Capture(CaptureSpec {
                start,
                end,
                kind: self.capture_type.unwrap_or(CaptureKind::Mp4),
                quality: self.capture_quality.unwrap_or_default(),
                silent: self.capture_silent,
            })));
        }
        Ok(None)
    }
}

/// Serve a file or one of its derived assets
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = params.asset_request()?;
    let library = state.library().await;
    let file = library.resolve_file(&params.path).await?;
    let info = file.info();

    match request {
        None => {
            FileResponse {
                path: &info.abs_path,
                size: info.size,
                mime: &info.mime,
                name: Some(&info.name),
            }
            .send(&headers)
            .await
        }
        Some(request) => {
            let asset = state
                .assets()
                .get_or_create(&file.to_source(), request)
                .await?;
            let name = derived_name(&info.name, &asset.path);
            FileResponse {
                path: &asset.path,
                size: asset.size,
                mime: asset.mime,
                name: Some(&name),
            }
            .send(&headers)
            .await
        }
    }
}

/// Download name of a derived asset: `<source stem>.<asset file name>`.
fn derived_name(source_name: &str, asset_path: &Path) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());
    let asset = asset_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}", stem, asset)
}
