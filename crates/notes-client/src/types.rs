//! Wire DTOs for the Memos v1 API.
//!
//! Responses are kept as raw JSON and folded through
//! [`Note::from_value`](mt_domain::note::Note::from_value), which tolerates
//! every memo shape the service has produced across versions.

use mt_domain::note::{Note, Visibility};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// POST /api/v1/{parent}/comments: request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    pub visibility: Visibility,
}

/// GET /api/v1/memos: response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesResponse {
    #[serde(default)]
    pub memos: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl ListNotesResponse {
    pub fn into_notes(self) -> Vec<Note> {
        self.memos.iter().map(Note::from_value).collect()
    }
}

/// Some deployments wrap a single memo as `{"memo": {...}}`.
pub fn unwrap_memo(body: &Value) -> &Value {
    match body.get("memo") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_visibility_as_string() {
        let req = CreateCommentRequest {
            content: "hi".into(),
            visibility: Visibility::Private,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, json!({"content": "hi", "visibility": "PRIVATE"}));
    }

    #[test]
    fn wrapped_memo_is_unwrapped() {
        let body = json!({"memo": {"name": "memos/7"}});
        assert_eq!(unwrap_memo(&body)["name"], "memos/7");
        let bare = json!({"name": "memos/8"});
        assert_eq!(unwrap_memo(&bare)["name"], "memos/8");
    }

    #[test]
    fn list_response_tolerates_missing_fields() {
        let resp: ListNotesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.into_notes().is_empty());
    }
}
