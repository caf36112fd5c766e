// GET /news-image?src=<url>: proxy an article image for the browser.
//
// The response is decided before any byte is written: the upstream image
// with its own content type, the placeholder SVG, or 508 on a redirect loop.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::proxy::{ProxiedImage, IMAGE_CACHE_CONTROL, PLACEHOLDER_CONTENT_TYPE, PLACEHOLDER_SVG};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub src: Option<String>,
}

pub async fn proxy_image(State(state): State<AppState>, Query(query): Query<ImageQuery>) -> Response {
    let Some(src) = query.src.filter(|s| !s.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "src query param required").into_response();
    };

    match state.proxy.fetch(&src).await {
        Ok(image) => image_response(&src, image),
        Err(e) if e.is_redirect_loop() => (StatusCode::LOOP_DETECTED, "redirect loop").into_response(),
        Err(e) => {
            debug!("Serving placeholder for {}: {}", src, e);
            placeholder_response()
        }
    }
}

pub fn placeholder_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PLACEHOLDER_CONTENT_TYPE),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        ],
        PLACEHOLDER_SVG,
    )
        .into_response()
}

fn image_response(src: &str, image: ProxiedImage) -> Response {
    let src = src.to_string();
    let body = image
        .body
        .inspect_err(move |e| warn!("Upstream body failed mid-stream for {}: {}", src, e));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type)
        .header(header::CACHE_CONTROL, IMAGE_CACHE_CONTROL)
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| placeholder_response())
}
