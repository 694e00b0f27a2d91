use serde::Serialize;

/// Structured trace events emitted across all memotic crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    WebhookDispatched {
        matched_types: usize,
        triggered_handlers: usize,
        errors: usize,
        duration_ms: u64,
    },
    EventMatched {
        event_type: String,
        activity: String,
        note: Option<String>,
    },
    HandlerFailed {
        event_type: String,
        handler: String,
        error: String,
    },
    CommandBlocked {
        command: String,
        recognizer: String,
    },
    CommandExecuted {
        command: String,
        exit_code: i32,
        duration_ms: Option<u64>,
        allow_failure: bool,
    },
    ContainerReady {
        container: String,
        duration_ms: u64,
    },
    CommentPosted {
        parent: String,
        chunk: usize,
        total: usize,
        ok: bool,
    },
    NoteApiCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mt_event");
    }
}
