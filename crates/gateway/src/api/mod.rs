pub mod auth;
pub mod events;
pub mod health;
pub mod search;
pub mod webhooks;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (webhook intake and health) and
/// **protected** (gated behind the bearer-token middleware).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/webhooks/webhook", post(webhooks::receive))
        .route("/v1/webhooks/memos", post(webhooks::receive))
        .route("/health", get(health::health))
        .route("/health/sandbox", get(health::sandbox));

    let protected = Router::new()
        .route("/v1/events", get(events::list_event_types))
        .route("/v1/search", get(search::search))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
