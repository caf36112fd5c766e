// GET /news?limit=N&nocache=1: cached, newest-first security news.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cache::clamp_limit;
use crate::types::NewsItem;
use crate::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub limit: Option<String>,
    pub nocache: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewsResponse {
    pub items: Vec<NewsItem>,
}

impl NewsQuery {
    /// Unparseable values fall back to the default page size.
    pub fn limit(&self) -> usize {
        clamp_limit(self.limit.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok()))
    }

    pub fn force_refresh(&self) -> bool {
        self.nocache
            .as_deref()
            .map(|v| v.trim().to_ascii_lowercase())
            .is_some_and(|v| v == "1" || v == "true")
    }
}

pub async fn get_news(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Json<NewsResponse> {
    let items = state.news.get(query.limit(), query.force_refresh()).await;
    Json(NewsResponse { items })
}
