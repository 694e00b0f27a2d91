use std::sync::Arc;
use std::time::Instant;

use mt_domain::config::Config;
use mt_engine::handlers::SearchIndex;
use mt_engine::{Dispatcher, Registry};
use mt_notes::NoteApi;
use mt_sandbox::ContainerManager;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub notes: Arc<dyn NoteApi>,
    pub containers: Arc<dyn ContainerManager>,

    // ── Engine ────────────────────────────────────────────────────────
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    pub index: Arc<SearchIndex>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
    /// Shared secret for `X-Hub-Signature-256` verification. `None` = the
    /// webhook endpoint accepts unsigned payloads.
    pub webhook_secret: Option<String>,

    pub started_at: Instant,
}
