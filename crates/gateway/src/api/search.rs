use axum::extract::{Query, State};
use axum::response::Json;
use mt_engine::handlers::IndexEntry;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// Comma-separated tag filter.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /v1/search?q=..&tags=a,b&limit=N`: newest first.
pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Json<Vec<IndexEntry>> {
    let tags: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();

    let mut hits = state.index.search(&query.q, &tags).await;
    hits.truncate(query.limit);
    Json(hits)
}
