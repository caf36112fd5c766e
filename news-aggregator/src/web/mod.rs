// HTTP surface: news listing, image proxy, scanner relays and health.
//
// Every route is mounted at the root and again under /api, the prefix the
// browser client uses.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use interfaces::Scanner;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::NewsCache;
use crate::proxy::ImageProxy;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsCache>,
    pub proxy: Arc<ImageProxy>,
    pub scanner: Arc<dyn Scanner>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub started_at: Instant,
}

/// Start the Axum server and block until it exits.
pub async fn run_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);

    info!("News aggregator listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/news", get(handlers::news::get_news))
        .route("/news-image", get(handlers::image::proxy_image))
        .route("/scan-url", post(handlers::scan::scan_url))
        .route("/scan-file", post(handlers::scan::scan_file))
        .route("/scan-log", post(handlers::scan::scan_log))
        .route("/healthz", get(health));

    Router::new()
        .route("/", get(root))
        .merge(api.clone())
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::AUTHORIZATION,
                    header::HeaderName::from_static("x-requested-with"),
                    header::ORIGIN,
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "News aggregator API is running. See /healthz for status."
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// JSON `{message, details?}` error body used by the scan endpoints.
pub fn api_error(status: StatusCode, message: &str, details: Option<String>) -> Response {
    let body = match details {
        Some(details) => serde_json::json!({ "message": message, "details": details }),
        None => serde_json::json!({ "message": message }),
    };
    (status, Json(body)).into_response()
}
