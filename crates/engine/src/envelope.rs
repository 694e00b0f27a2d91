//! Webhook envelope shapes and payload normalization.
//!
//! Upstream senders wrap the memo differently: `{memo: ..}`, `{data: ..}`,
//! `{after: ..}`, `{payload: ..}`, or no wrapper at all. [`Envelope`] names
//! the shape once so every later stage reads the memo from the same place.

use std::collections::BTreeMap;

use mt_domain::note::{Actor, Note};
use serde_json::{Map, Value};

/// Request headers as received, original casing kept. Lookups go through
/// [`header`], which is case-insensitive.
pub type Headers = BTreeMap<String, String>;

pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope<'a> {
    Memo(&'a Map<String, Value>),
    Data(&'a Map<String, Value>),
    After(&'a Map<String, Value>),
    Payload(&'a Map<String, Value>),
    /// No recognised wrapper; the payload itself is the memo.
    Bare(&'a Map<String, Value>),
}

const PREVIOUS_KEYS: &[&str] = &["previous", "before", "prev", "old"];
const ACTOR_KEYS: &[&str] = &["user", "creator", "author"];
const ACTIVITY_KEYS: &[&str] = &[
    "activity",
    "action",
    "event",
    "type",
    "event_type",
    "operation",
    "activityType",
];

fn non_empty_object<'a>(m: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    m.get(key).and_then(Value::as_object).filter(|o| !o.is_empty())
}

impl<'a> Envelope<'a> {
    /// First wrapper key holding a non-empty object wins. `None` only when
    /// the payload is not a JSON object at all.
    pub fn locate(raw: &'a Value) -> Option<Self> {
        let root = raw.as_object()?;
        let found = if let Some(m) = non_empty_object(root, "memo") {
            Self::Memo(m)
        } else if let Some(m) = non_empty_object(root, "data") {
            Self::Data(m)
        } else if let Some(m) = non_empty_object(root, "after") {
            Self::After(m)
        } else if let Some(m) = non_empty_object(root, "payload") {
            Self::Payload(m)
        } else {
            Self::Bare(root)
        };
        Some(found)
    }

    pub fn memo(&self) -> &'a Map<String, Value> {
        match *self {
            Self::Memo(m) | Self::Data(m) | Self::After(m) | Self::Payload(m) | Self::Bare(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memo(_) => "memo",
            Self::Data(_) => "data",
            Self::After(_) => "after",
            Self::Payload(_) => "payload",
            Self::Bare(_) => "bare",
        }
    }
}

/// Everything later stages need from one payload, computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayload {
    pub note: Note,
    pub previous: Option<Note>,
    pub actor: Option<Actor>,
    /// Raw inline activity field (`action`, `event`, ...), unclassified.
    pub inline_activity: Option<String>,
    pub envelope: &'static str,
}

/// Normalize a raw webhook payload. `None` when `raw` is not an object.
pub fn normalize(raw: &Value) -> Option<NormalizedPayload> {
    let envelope = Envelope::locate(raw)?;
    let root = raw.as_object()?;

    let note = Note::from_value(&Value::Object(envelope.memo().clone()));
    let previous = PREVIOUS_KEYS
        .iter()
        .find_map(|k| non_empty_object(root, k))
        .map(|m| Note::from_value(&Value::Object(m.clone())));
    let actor = ACTOR_KEYS
        .iter()
        .find_map(|k| root.get(*k).and_then(Actor::coerce))
        .or_else(|| note.creator.clone());
    let inline_activity = ACTIVITY_KEYS
        .iter()
        .find_map(|k| root.get(*k).and_then(Value::as_str))
        .map(str::to_owned);

    Some(NormalizedPayload {
        note,
        previous,
        actor,
        inline_activity,
        envelope: envelope.kind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probes_wrappers_in_order() {
        let raw = json!({"data": {"content": "d"}, "after": {"content": "a"}});
        assert_eq!(Envelope::locate(&raw).unwrap().kind(), "data");

        let raw = json!({"memo": {}, "after": {"content": "a"}});
        assert_eq!(Envelope::locate(&raw).unwrap().kind(), "after");

        let raw = json!({"payload": {"content": "p"}});
        assert_eq!(Envelope::locate(&raw).unwrap().kind(), "payload");
    }

    #[test]
    fn bare_payload_is_the_memo() {
        let raw = json!({"name": "memos/3", "content": "top level", "tags": ["x"]});
        let n = normalize(&raw).unwrap();
        assert_eq!(n.envelope, "bare");
        assert_eq!(n.note.content, "top level");
        assert_eq!(n.note.name.as_deref(), Some("memos/3"));
    }

    #[test]
    fn non_object_payload_has_no_envelope() {
        assert!(Envelope::locate(&json!([1, 2])).is_none());
        assert!(normalize(&json!("memo")).is_none());
    }

    #[test]
    fn missing_memo_fields_default() {
        let n = normalize(&json!({"action": "create"})).unwrap();
        assert_eq!(n.note.content, "");
        assert!(n.note.tags.is_empty());
        assert_eq!(n.inline_activity.as_deref(), Some("create"));
    }

    #[test]
    fn previous_actor_and_hint() {
        let raw = json!({
            "event": "memo.updated",
            "user": "users/7",
            "memo": {"content": "new"},
            "before": {"content": "old"},
        });
        let n = normalize(&raw).unwrap();
        assert_eq!(n.previous.unwrap().content, "old");
        assert_eq!(n.actor.unwrap().username.as_deref(), Some("users/7"));
        assert_eq!(n.inline_activity.as_deref(), Some("memo.updated"));
    }

    #[test]
    fn actor_falls_back_to_memo_creator() {
        let raw = json!({"memo": {"creator": "users/1"}});
        let n = normalize(&raw).unwrap();
        assert_eq!(n.actor.unwrap().username.as_deref(), Some("users/1"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("X-Memos-Event".into(), "created".into());
        assert_eq!(header(&h, "x-memos-event"), Some("created"));
        assert_eq!(header(&h, "x-action"), None);
    }
}
