//! REST implementation of [`NoteApi`].
//!
//! `RestNoteClient` wraps a `reqwest::Client` and translates every trait
//! method into the corresponding HTTP call against the Memos v1 API, with
//! automatic retry + exponential back-off on transient (5xx / timeout)
//! failures. Non-idempotent calls (comment creation) are only resent when
//! the connection was never established.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mt_domain::config::NotesApiConfig;
use mt_domain::error::{Error, Result};
use mt_domain::note::{Note, Visibility};
use mt_domain::trace::TraceEvent;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::provider::NoteApi;
use crate::types::{unwrap_memo, CreateCommentRequest, ListNotesResponse};

const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Whether a request may be resent after the server may have seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idempotency {
    Safe,
    Unsafe,
}

/// Delay before retry `attempt` (1-based): 100ms, 200ms, 400ms, ... capped.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor)).min(BACKOFF_CAP)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the note service.
///
/// Created once and shared for the lifetime of the process. The
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestNoteClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl RestNoteClient {
    /// Build a client from config, reading the token from `token_env`.
    pub fn new(cfg: &NotesApiConfig) -> Result<Self> {
        Self::with_token(cfg, cfg.token())
    }

    /// Build a client with an explicit token.
    pub fn with_token(cfg: &NotesApiConfig, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.url(),
            token,
            max_retries: cfg.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb
            .header("User-Agent", concat!("memotic/", env!("CARGO_PKG_VERSION")))
            .header("X-Trace-Id", Uuid::new_v4().to_string());
        match self.token {
            Some(ref token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Build the full URL for a path like `/api/v1/memos`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient errors.
    ///
    /// * Retries on 5xx status codes, timeouts and connection errors.
    /// * `Idempotency::Unsafe` requests are retried on connection errors only.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * Emits a `TraceEvent::NoteApiCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        idempotency: Idempotency,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();

                    TraceEvent::NoteApiCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        let err = Error::NoteApi(format!("{endpoint} returned {status}: {body}"));
                        if idempotency == Idempotency::Unsafe {
                            return Err(err);
                        }
                        last_err = Some(err);
                        continue;
                    }

                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(classify_client_error(endpoint, status, body));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::NoteApiCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();

                    let resendable = idempotency == Idempotency::Safe || e.is_connect();
                    let err = from_reqwest(e);
                    if !resendable {
                        return Err(err);
                    }
                    last_err = Some(err);
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::NoteApi(format!("{endpoint}: all retries exhausted"))))
    }

    async fn json_body(resp: Response, what: &str) -> Result<Value> {
        let body = resp.text().await.map_err(from_reqwest)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::NoteApi(format!("failed to parse {what} response: {e}: {body}")))
    }
}

/// Map a 4xx response to the error category callers branch on.
fn classify_client_error(endpoint: &str, status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{endpoint} auth failed ({status}): {body}"))
        }
        StatusCode::NOT_FOUND => Error::NotFound(format!("{endpoint}: {body}")),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::Validation(format!("{endpoint} rejected request ({status}): {body}"))
        }
        _ => Error::NoteApi(format!("{endpoint} returned {status}: {body}")),
    }
}

/// `42` -> `memos/42`; resource names pass through.
fn resource_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    if name.contains('/') {
        name.to_owned()
    } else {
        format!("memos/{name}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl NoteApi for RestNoteClient {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn create_comment(&self, parent: &str, content: &str, visibility: Visibility) -> Result<Note> {
        let parent = resource_name(parent);
        let url = self.url(&format!("/api/v1/{parent}/comments"));
        let req = CreateCommentRequest {
            content: content.to_owned(),
            visibility,
        };
        let endpoint = format!("POST /api/v1/{parent}/comments");
        let resp = self
            .execute_with_retry(&endpoint, Idempotency::Unsafe, || self.http.post(&url).json(&req))
            .await?;

        let body = Self::json_body(resp, "comment").await?;
        let note = Note::from_value(unwrap_memo(&body));
        tracing::debug!(parent = %parent, created = ?note.name, "comment created");
        Ok(note)
    }

    async fn get_note(&self, name: &str) -> Result<Option<Note>> {
        let name = resource_name(name);
        let url = self.url(&format!("/api/v1/{name}"));
        let endpoint = format!("GET /api/v1/{name}");
        match self.execute_with_retry(&endpoint, Idempotency::Safe, || self.http.get(&url)).await {
            Ok(resp) => {
                let body = Self::json_body(resp, "note").await?;
                Ok(Some(Note::from_value(unwrap_memo(&body))))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_notes(&self, filter: Option<&str>, page_size: Option<u32>) -> Result<Vec<Note>> {
        let url = self.url("/api/v1/memos");
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(f) = filter {
            query.push(("filter", f.to_owned()));
        }
        if let Some(n) = page_size {
            query.push(("pageSize", n.to_string()));
        }
        let resp = self
            .execute_with_retry("GET /api/v1/memos", Idempotency::Safe, || {
                self.http.get(&url).query(&query)
            })
            .await?;

        let body = Self::json_body(resp, "list").await?;
        let list: ListNotesResponse = serde_json::from_value(body)?;
        Ok(list.into_notes())
    }

    async fn health(&self) -> Result<bool> {
        let url = self.url("/healthz");
        let resp = self.execute_with_retry("GET /healthz", Idempotency::Safe, || self.http.get(&url)).await?;
        Ok(resp.status().is_success())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_are_normalized() {
        assert_eq!(resource_name("42"), "memos/42");
        assert_eq!(resource_name("memos/42"), "memos/42");
        assert_eq!(resource_name("/memos/42"), "memos/42");
    }

    #[test]
    fn client_errors_are_categorized() {
        let e = classify_client_error("x", StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(e, Error::Auth(_)));
        let e = classify_client_error("x", StatusCode::NOT_FOUND, String::new());
        assert!(matches!(e, Error::NotFound(_)));
        let e = classify_client_error("x", StatusCode::UNPROCESSABLE_ENTITY, String::new());
        assert!(matches!(e, Error::Validation(_)));
        let e = classify_client_error("x", StatusCode::CONFLICT, String::new());
        assert!(matches!(e, Error::NoteApi(_)));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(1), Duration::from_millis(100));
        assert_eq!(backoff(2), Duration::from_millis(200));
        assert_eq!(backoff(4), Duration::from_millis(800));
        assert_eq!(backoff(10), BACKOFF_CAP);
        assert_eq!(backoff(64), BACKOFF_CAP);
        assert_eq!(backoff(u32::MAX), BACKOFF_CAP);
    }

    #[test]
    fn missing_token_means_unconfigured() {
        let client = RestNoteClient::with_token(&NotesApiConfig::default(), None).unwrap();
        assert!(!client.is_configured());
        let client =
            RestNoteClient::with_token(&NotesApiConfig::default(), Some("t".into())).unwrap();
        assert!(client.is_configured());
    }
}
