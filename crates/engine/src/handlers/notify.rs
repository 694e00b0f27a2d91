use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mt_domain::config::{NotifyChannel, NotifyConfig};
use mt_domain::error::{Error, Result};
use serde_json::json;

use crate::registry::{EventHandler, MemoEvent};

const CONSOLE_PREVIEW_CHARS: usize = 100;
const WEBHOOK_PREVIEW_CHARS: usize = 200;

/// Console (structured log) and JSON webhook notifications.
pub struct NotifyHandler {
    http: reqwest::Client,
    channels: Vec<NotifyChannel>,
    webhook_url: Option<String>,
}

fn preview(content: &str, n: usize) -> String {
    content.chars().take(n).collect()
}

impl NotifyHandler {
    pub fn new(cfg: &NotifyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            channels: cfg.channels.clone(),
            webhook_url: cfg.webhook_url.clone().filter(|u| !u.trim().is_empty()),
        })
    }

    fn title(event: &MemoEvent) -> String {
        format!("{} ({})", event.type_name, event.activity)
    }

    fn message(event: &MemoEvent) -> String {
        match event.note.name.as_deref() {
            Some(name) => format!("memo {name} matched"),
            None => "memo matched".to_owned(),
        }
    }

    fn console(&self, event: &MemoEvent) {
        tracing::info!(
            title = %Self::title(event),
            message = %Self::message(event),
            tags = ?event.note.tags,
            preview = %preview(&event.note.content, CONSOLE_PREVIEW_CHARS),
            "notification"
        );
    }

    async fn webhook(&self, url: &str, event: &MemoEvent) -> Result<()> {
        let body = json!({
            "title": Self::title(event),
            "message": Self::message(event),
            "memo": {
                "name": event.note.name,
                "tags": event.note.tags,
                "content_preview": preview(&event.note.content, WEBHOOK_PREVIEW_CHARS),
                "action": event.activity.as_str(),
                "timestamp": Utc::now().to_rfc3339(),
            },
        });
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(mt_notes::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("notification webhook returned {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for NotifyHandler {
    fn name(&self) -> &str {
        "notify"
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        for channel in &self.channels {
            match channel {
                NotifyChannel::Console => self.console(event),
                NotifyChannel::Webhook => match self.webhook_url.as_deref() {
                    Some(url) => self.webhook(url, event).await?,
                    None => tracing::warn!(note = ?event.note.name, "webhook channel enabled without a url"),
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use mt_domain::note::Note;
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::activity::ActivityKind;
    use crate::test_log;

    type Received = Arc<Mutex<Vec<Value>>>;

    fn event() -> MemoEvent {
        MemoEvent {
            type_name: "Urgent".into(),
            note: Note {
                name: Some("memos/5".into()),
                content: "x".repeat(300),
                tags: vec!["urgent".into()],
                ..Note::default()
            },
            previous: None,
            actor: None,
            activity: ActivityKind::Create,
            headers: Default::default(),
            raw: Value::Null,
        }
    }

    fn handler(channels: Vec<NotifyChannel>, webhook_url: Option<String>) -> NotifyHandler {
        NotifyHandler::new(&NotifyConfig {
            channels,
            webhook_url,
            timeout_ms: 2000,
        })
        .unwrap()
    }

    async fn record(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
        received.lock().push(body);
        StatusCode::OK
    }

    async fn spawn() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/hook", post(record))
            .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[tokio::test]
    async fn webhook_receives_memo_summary() {
        let (base, received) = spawn().await;
        let h = handler(vec![NotifyChannel::Webhook], Some(format!("{base}/hook")));
        h.handle(&event()).await.unwrap();

        let bodies = received.lock();
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["title"], "Urgent (create)");
        assert_eq!(body["message"], "memo memos/5 matched");
        assert_eq!(body["memo"]["name"], "memos/5");
        assert_eq!(body["memo"]["tags"], serde_json::json!(["urgent"]));
        assert_eq!(body["memo"]["action"], "create");
        assert_eq!(
            body["memo"]["content_preview"].as_str().unwrap().chars().count(),
            WEBHOOK_PREVIEW_CHARS
        );
        assert!(body["memo"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn server_error_fails_the_handler() {
        let (base, _) = spawn().await;
        let h = handler(vec![NotifyChannel::Webhook], Some(format!("{base}/broken")));
        let err = h.handle(&event()).await.unwrap_err();
        assert!(matches!(&err, Error::Http(m) if m.contains("500")), "{err}");
    }

    #[tokio::test]
    async fn console_channel_logs_notification() {
        let (logs, _guard) = test_log::capture();
        let h = handler(vec![NotifyChannel::Console], None);
        h.handle(&event()).await.unwrap();
        let out = logs.contents();
        assert!(out.contains("notification"), "{out}");
        assert!(out.contains("title=Urgent (create)"), "{out}");
    }

    #[tokio::test]
    async fn missing_webhook_url_warns_and_succeeds() {
        let (logs, _guard) = test_log::capture();
        let h = handler(vec![NotifyChannel::Webhook], Some("  ".into()));
        h.handle(&event()).await.unwrap();
        let out = logs.contents();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("webhook channel enabled without a url"), "{out}");
    }
}
