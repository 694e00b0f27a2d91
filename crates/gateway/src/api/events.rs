use axum::extract::State;
use axum::response::Json;
use mt_engine::EventTypeSummary;

use crate::state::AppState;

/// `GET /v1/events`: registered event types in dispatch order.
pub async fn list_event_types(State(state): State<AppState>) -> Json<Vec<EventTypeSummary>> {
    Json(state.registry.describe())
}
