//! Router-level tests: webhook intake, signature checks, auth, listing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use mt_domain::config::{Config, EventRuleConfig, HandlerAction, RuleHandlerConfig};
use mt_domain::error::Result;
use mt_domain::note::{Note, Visibility};
use mt_gateway::api;
use mt_gateway::bootstrap::build_app_state_with;
use mt_gateway::state::AppState;
use mt_notes::NoteApi;
use mt_sandbox::{ContainerManager, ContainerStatus, ShellOutput};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

#[derive(Default)]
struct EchoContainers {
    status_calls: AtomicUsize,
}

#[async_trait]
impl ContainerManager for EchoContainers {
    async fn ensure_container(&self) -> Result<String> {
        Ok("fake".into())
    }

    async fn execute_shell(&self, _c: &str, command: &str, _t: Duration) -> Result<ShellOutput> {
        Ok(ShellOutput {
            exit_code: 0,
            stdout: command.trim_start_matches("echo ").to_owned(),
            stderr: String::new(),
            duration_secs: 0.01,
        })
    }

    async fn status(&self) -> ContainerStatus {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        ContainerStatus {
            name: "fake".into(),
            exists: true,
            running: true,
            healthy: true,
            error: None,
        }
    }
}

#[derive(Default)]
struct SilentNotes;

#[async_trait]
impl NoteApi for SilentNotes {
    fn is_configured(&self) -> bool {
        false
    }

    async fn create_comment(&self, _p: &str, _c: &str, _v: Visibility) -> Result<Note> {
        Ok(Note::default())
    }

    async fn get_note(&self, _name: &str) -> Result<Option<Note>> {
        Ok(None)
    }

    async fn list_notes(&self, _f: Option<&str>, _n: Option<u32>) -> Result<Vec<Note>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<bool> {
        Ok(false)
    }
}

fn test_config(index_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.handlers.index.path = index_dir.to_path_buf();
    config.events.rules.push(EventRuleConfig {
        name: "Indexed".into(),
        any_tags: vec!["notes".into()],
        all_tags: vec![],
        content_contains: None,
        content_pattern: None,
        visibility: None,
        min_word_count: None,
        handlers: vec![RuleHandlerConfig {
            on: "any".into(),
            action: HandlerAction::Index,
        }],
    });
    config
}

fn state(index_dir: &std::path::Path) -> AppState {
    state_with(index_dir, Arc::new(EchoContainers::default()))
}

fn state_with(index_dir: &std::path::Path, containers: Arc<EchoContainers>) -> AppState {
    build_app_state_with(Arc::new(test_config(index_dir)), Arc::new(SilentNotes), containers).unwrap()
}

fn app(state: AppState) -> Router {
    api::router(state.clone()).with_state(state)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn cli_webhook_reports_match() {
    let tmp = tempfile::tempdir().unwrap();
    let payload = json!({
        "action": "create",
        "memo": {"name": "memos/1", "content": "#cli echo hi", "tags": ["cli"]},
    });
    let (status, body) = send(app(state(tmp.path())), post("/webhooks/webhook", &payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");
    assert_eq!(body["success"], true);
    assert_eq!(body["matches"], json!(["CliTagged"]));
    assert_eq!(body["triggered"], json!(["CliTagged.run_cli"]));
    assert_eq!(body["activity"], "create");
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (status, body) = send(app(state(tmp.path())), post("/v1/webhooks/memos", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[tokio::test]
async fn odd_json_still_returns_200() {
    let tmp = tempfile::tempdir().unwrap();
    let (status, body) = send(app(state(tmp.path())), post("/webhooks/webhook", "[1, 2, 3]")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["matches"], json!([]));
}

#[tokio::test]
async fn signature_is_enforced_when_secret_set() {
    let tmp = tempfile::tempdir().unwrap();
    let mut st = state(tmp.path());
    st.webhook_secret = Some("s3cret".into());
    let body = r#"{"memo":{"content":"x"}}"#;

    let (status, _) = send(app(st.clone()), post("/webhooks/webhook", body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cret").unwrap();
    mac.update(body.as_bytes());
    let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
    let mut req = post("/webhooks/webhook", body);
    req.headers_mut().insert("x-hub-signature-256", sig.parse().unwrap());
    let (status, _) = send(app(st), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let tmp = tempfile::tempdir().unwrap();
    let mut st = state(tmp.path());
    st.api_token_hash = Some(Sha256::digest(b"tok").to_vec());

    let (status, _) = send(app(st.clone()), Request::get("/v1/events").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/v1/events")
        .header("authorization", "Bearer tok")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(st.clone()), req).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["CliTagged", "Indexed"]);

    let (status, _) = send(app(st), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn indexed_notes_are_searchable() {
    let tmp = tempfile::tempdir().unwrap();
    let st = state(tmp.path());
    let payload = json!({"memo": {"name": "memos/4", "content": "Quarterly planning notes", "tags": ["notes"]}});
    let (status, body) = send(app(st.clone()), post("/webhooks/webhook", &payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["triggered"], json!(["Indexed.index"]));

    let req = Request::get("/v1/search?q=planning&tags=notes").body(Body::empty()).unwrap();
    let (status, body) = send(app(st), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "memos/4");
}

#[tokio::test]
async fn health_is_liveness_only() {
    let tmp = tempfile::tempdir().unwrap();
    let containers = Arc::new(EchoContainers::default());
    let st = state_with(tmp.path(), containers.clone());
    let (status, body) = send(app(st), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["notes_api"]["configured"], false);
    assert_eq!(body["event_types"], 2);
    assert!(body.get("container").is_none());
    assert_eq!(containers.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sandbox_health_checks_collaborators() {
    let tmp = tempfile::tempdir().unwrap();
    let containers = Arc::new(EchoContainers::default());
    let st = state_with(tmp.path(), containers.clone());
    let req = Request::get("/health/sandbox").body(Body::empty()).unwrap();
    let (status, body) = send(app(st), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["container"]["running"], true);
    assert_eq!(body["notes_api"]["reachable"], false);
    assert_eq!(body["status"], "degraded");
    assert_eq!(containers.status_calls.load(Ordering::SeqCst), 1);
}
