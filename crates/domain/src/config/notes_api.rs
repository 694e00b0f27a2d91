use serde::{Deserialize, Serialize};

use crate::note::Visibility;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Note-service API connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesApiConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_5232")]
    pub port: u16,
    /// Full base URL; takes precedence over `host`/`port` when set.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Visibility of comments posted back to the originating note.
    #[serde(default)]
    pub comment_visibility: Visibility,
}

impl Default for NotesApiConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 5232,
            base_url: None,
            token_env: d_token_env(),
            timeout_ms: 30_000,
            max_retries: 3,
            comment_visibility: Visibility::Private,
        }
    }
}

impl NotesApiConfig {
    pub fn url(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_owned(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// Read the bearer token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "localhost".into()
}
fn d_5232() -> u16 {
    5232
}
fn d_token_env() -> String {
    "MEMOS_TOKEN".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_3() -> u32 {
    3
}
