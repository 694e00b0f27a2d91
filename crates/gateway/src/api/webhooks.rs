//! Memo webhook intake: `POST /webhooks/webhook` (and `/v1/webhooks/memos`).
//!
//! When a webhook secret is configured the request must carry
//! `X-Hub-Signature-256: sha256=<hex>` computed over the raw body.
//! Processing failures never change the status code: the response is 200
//! with the itemized dispatch result. Only a body that is not JSON is
//! rejected (400).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use mt_engine::{DispatchResult, Headers};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::Instrument;
use uuid::Uuid;

use super::api_error;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub success: bool,
    pub matches: Vec<String>,
    pub triggered: Vec<String>,
    pub errors: Vec<String>,
    pub activity: Option<String>,
    pub processing_time_seconds: f64,
}

impl From<DispatchResult> for WebhookResponse {
    fn from(r: DispatchResult) -> Self {
        Self {
            status: "processed",
            success: r.success,
            matches: r.matched_types,
            triggered: r.triggered_handlers,
            errors: r.errors.iter().map(ToString::to_string).collect(),
            activity: r.activity.map(|a| a.as_str().to_owned()),
            processing_time_seconds: r.processing_time_seconds,
        }
    }
}

/// `sha256=<hex>` (or bare hex) against HMAC-SHA256 of `body`.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let sig_hex = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());
    computed.as_bytes().ct_eq(sig_hex.as_bytes()).unwrap_u8() == 1
}

/// Header names lower-cased; values that are not valid UTF-8 are dropped.
pub fn collect_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_owned(), v.to_owned())))
        .collect()
}

pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(ref secret) = state.webhook_secret {
        let sig = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, sig) {
            return api_error(StatusCode::UNAUTHORIZED, "invalid webhook signature");
        }
    }

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")),
    };

    let request_id = Uuid::new_v4();
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();
    let span = tracing::info_span!("webhook", %request_id, %user_agent);

    let result = state
        .dispatcher
        .dispatch(&raw, &collect_headers(&headers))
        .instrument(span)
        .await;
    tracing::info!(
        %request_id,
        matched = ?result.matched_types,
        success = result.success,
        "webhook processed"
    );

    (StatusCode::OK, Json(WebhookResponse::from(result))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
        mac.update(b"{}");
        let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        assert!(verify_signature("s3cret", b"{}", &sig));
        assert!(!verify_signature("s3cret", b"{ }", &sig));
        assert!(!verify_signature("other", b"{}", &sig));
        assert!(!verify_signature("s3cret", b"{}", ""));
    }

    #[test]
    fn headers_keep_only_utf8_values() {
        let mut h = HeaderMap::new();
        h.insert("X-Memos-Event", "memo.created".parse().unwrap());
        h.insert("x-bin", axum::http::HeaderValue::from_bytes(&[0xff]).unwrap());
        let out = collect_headers(&h);
        assert_eq!(out.get("x-memos-event").map(String::as_str), Some("memo.created"));
        assert!(!out.contains_key("x-bin"));
    }
}
