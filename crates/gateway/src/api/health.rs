use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`: liveness only. Never touches the container runtime or
/// the note service, so it answers immediately.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "event_types": state.registry.len(),
        "notes_api": { "configured": state.notes.is_configured() },
    }))
}

/// `GET /health/sandbox`: checks the sandbox container and the note
/// service. Each check is bounded by its own client timeouts.
pub async fn sandbox(State(state): State<AppState>) -> Json<Value> {
    let (container, notes) = tokio::join!(state.containers.status(), state.notes.health());
    let notes_reachable = match notes {
        Ok(ok) => ok,
        Err(e) => {
            tracing::debug!(error = %e, "note service health check failed");
            false
        }
    };

    Json(json!({
        "status": if container.running && notes_reachable { "ready" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "notes_api": {
            "configured": state.notes.is_configured(),
            "reachable": notes_reachable,
        },
        "container": container,
    }))
}
