// POST /scan-url, /scan-file, /scan-log: relay a target to the external scanner.
//
// Uploads are staged in the upload directory under a random name and removed
// once the scanner has finished, whatever the outcome.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use interfaces::{ScanError, ScanRequest};
use serde::Deserialize;
use tracing::{error, warn};
use url::Url;
use uuid::Uuid;

use crate::rss_utils::url::is_fetchable;
use crate::web::{api_error, AppState};

#[derive(Debug, Deserialize)]
pub struct ScanUrlBody {
    pub url: Option<String>,
}

pub async fn scan_url(State(state): State<AppState>, Json(body): Json<ScanUrlBody>) -> Response {
    let Some(url) = body.url.filter(|u| !u.trim().is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "URL is required", None);
    };

    if !Url::parse(url.trim()).is_ok_and(|u| is_fetchable(&u)) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid URL format" })),
        )
            .into_response();
    }

    run_scan(&state, ScanRequest::url(url.trim())).await
}

pub async fn scan_file(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((file_name, bytes.to_vec())),
                    Err(e) => return api_error(StatusCode::BAD_REQUEST, "Malformed upload", Some(e.to_string())),
                }
            }
            Ok(None) => break,
            Err(e) => return api_error(StatusCode::BAD_REQUEST, "Malformed upload", Some(e.to_string())),
        }
    }

    let Some((file_name, bytes)) = upload else {
        return api_error(StatusCode::BAD_REQUEST, "No file uploaded", None);
    };

    let path = match stage_upload(&state.upload_dir, &Uuid::new_v4().to_string(), &bytes).await {
        Ok(path) => path,
        Err(e) => return unexpected(e),
    };

    let request = ScanRequest::file(path.to_string_lossy(), file_name);
    scan_and_remove(&state, request, &path).await
}

pub async fn scan_log(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file: Option<Vec<u8>> = None;
    let mut text: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().map(str::to_string);
                let result = match name.as_deref() {
                    Some("file") => field.bytes().await.map(|b| file = Some(b.to_vec())),
                    Some("text") => field.text().await.map(|t| text = Some(t)),
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    return api_error(StatusCode::BAD_REQUEST, "Malformed upload", Some(e.to_string()));
                }
            }
            Ok(None) => break,
            Err(e) => return api_error(StatusCode::BAD_REQUEST, "Malformed upload", Some(e.to_string())),
        }
    }

    let contents = match (file, text) {
        (Some(bytes), _) => bytes,
        (None, Some(text)) if !text.trim().is_empty() => text.into_bytes(),
        _ => {
            return api_error(
                StatusCode::BAD_REQUEST,
                "Provide a log file or non-empty 'text' field",
                None,
            )
        }
    };

    let name = format!("log_{}.txt", Uuid::new_v4());
    let path = match stage_upload(&state.upload_dir, &name, &contents).await {
        Ok(path) => path,
        Err(e) => return unexpected(e),
    };

    scan_and_remove(&state, ScanRequest::log(path.to_string_lossy()), &path).await
}

async fn stage_upload(dir: &Path, name: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}

async fn scan_and_remove(state: &AppState, request: ScanRequest, path: &Path) -> Response {
    let response = run_scan(state, request).await;
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Error deleting temporary file {}: {}", path.display(), e);
    }
    response
}

async fn run_scan(state: &AppState, request: ScanRequest) -> Response {
    match state.scanner.scan(&request).await {
        Ok(verdict) => Json(verdict.into_value()).into_response(),
        Err(e @ ScanError::InvalidOutput { .. }) => {
            error!("Error parsing scanner output: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing scan results",
                Some(e.details()),
            )
        }
        Err(e) => {
            error!("{} scan failed: {}", request.kind.label(), e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("{} scan failed", request.kind.label()),
                Some(e.details()),
            )
        }
    }
}

fn unexpected(e: std::io::Error) -> Response {
    error!("Failed to stage upload: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error", Some(e.to_string()))
}
