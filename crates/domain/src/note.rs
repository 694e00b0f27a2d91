//! Canonical note ("memo") model.
//!
//! Upstream webhooks send memo objects in several loosely related shapes:
//! timestamps as RFC 3339 strings, epoch numbers or `{ "seconds": N }`
//! objects, enums as integer codes or strings, the creator as a bare
//! resource name or a full object. [`Note::from_value`] folds all of them
//! into one representation and never fails: anything it cannot read
//! becomes the field's default.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enumerations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Private,
    Protected,
    Public,
    #[serde(rename = "VISIBILITY_UNSPECIFIED")]
    Unspecified,
}

impl Visibility {
    /// Map the integer codes used by the note service (1/2/3).
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Private,
            2 => Self::Protected,
            3 => Self::Public,
            _ => Self::Unspecified,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIVATE" => Self::Private,
            "PROTECTED" => Self::Protected,
            "PUBLIC" => Self::Public,
            _ => Self::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Protected => "PROTECTED",
            Self::Public => "PUBLIC",
            Self::Unspecified => "VISIBILITY_UNSPECIFIED",
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::from_code),
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    #[default]
    Normal,
    Archived,
    #[serde(rename = "STATE_UNSPECIFIED")]
    Unspecified,
}

impl State {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Normal,
            2 => Self::Archived,
            _ => Self::Unspecified,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Self::Normal,
            "ARCHIVED" => Self::Archived,
            _ => Self::Unspecified,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::from_code),
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }
}

/// Names for the integer node-type codes of the markup AST.
fn node_type_name(code: i64) -> String {
    let name = match code {
        1 => "LINE_BREAK",
        2 => "PARAGRAPH",
        3 => "CODE_BLOCK",
        4 => "HEADING",
        5 => "HORIZONTAL_RULE",
        6 => "BLOCKQUOTE",
        7 => "LIST",
        8 => "ORDERED_LIST_ITEM",
        9 => "UNORDERED_LIST_ITEM",
        10 => "TASK_LIST_ITEM",
        11 => "MATH_BLOCK",
        12 => "TABLE",
        13 => "EMBEDDED_CONTENT",
        51 => "TEXT",
        52 => "BOLD",
        53 => "ITALIC",
        54 => "BOLD_ITALIC",
        55 => "CODE",
        56 => "IMAGE",
        57 => "LINK",
        58 => "AUTO_LINK",
        59 => "TAG",
        60 => "STRIKETHROUGH",
        61 => "ESCAPING_CHARACTER",
        62 => "MATH",
        63 => "HIGHLIGHT",
        64 => "SUBSCRIPT",
        65 => "SUPERSCRIPT",
        66 => "SPOILER",
        other => return format!("UNKNOWN_{other}"),
    };
    name.to_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actor / attachment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The user behind a note or an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Actor {
    /// A bare string such as `"users/1"` becomes `{ username: "users/1" }`.
    pub fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self {
                username: Some(s.clone()),
                ..Self::default()
            }),
            Value::Object(m) => Some(Self {
                name: str_field(m, &["name"]),
                username: str_field(m, &["username"]),
                display_name: str_field(m, &["displayName", "display_name", "nickname"]),
                email: str_field(m, &["email"]),
            }),
            _ => None,
        }
    }

    /// Best label for logs and front matter.
    pub fn label(&self) -> &str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl Attachment {
    fn coerce(value: &Value) -> Option<Self> {
        let m = value.as_object()?;
        Some(Self {
            name: str_field(m, &["name"]),
            filename: str_field(m, &["filename"]).unwrap_or_default(),
            external_link: str_field(m, &["externalLink", "external_link"]),
            kind: str_field(m, &["type"]).unwrap_or_default(),
            size: m.get("size").and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Note
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Resource name, e.g. `memos/123`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    /// Explicit tags followed by tags found in the node tree, original
    /// casing kept, exact duplicates removed.
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub state: State,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Value>,
}

const CREATE_TIME_KEYS: &[&str] = &["createTime", "create_time", "createdAt", "created_at"];
const UPDATE_TIME_KEYS: &[&str] = &["updateTime", "update_time", "updatedAt", "updated_at"];
const DISPLAY_TIME_KEYS: &[&str] = &["displayTime", "display_time"];

impl Note {
    /// Coerce a memo-shaped JSON value. Non-objects yield an empty note.
    pub fn from_value(value: &Value) -> Self {
        let Some(m) = value.as_object() else {
            return Self::default();
        };

        let nodes = m.get("nodes").filter(|v| !v.is_null()).map(|v| {
            let mut nodes = v.clone();
            coerce_node_types(&mut nodes);
            nodes
        });

        let mut tags: Vec<String> = m
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(ref nodes) = nodes {
            tags.extend(extract_node_tags(nodes));
        }
        dedup_preserving_order(&mut tags);

        Self {
            name: note_name(m),
            content: str_field(m, &["content"]).unwrap_or_default(),
            tags,
            visibility: m
                .get("visibility")
                .and_then(Visibility::coerce)
                .unwrap_or_default(),
            state: m.get("state").and_then(State::coerce).unwrap_or_default(),
            pinned: m.get("pinned").and_then(Value::as_bool).unwrap_or(false),
            creator: ["creator", "user", "author"]
                .iter()
                .find_map(|k| m.get(*k).and_then(Actor::coerce)),
            create_time: time_field(m, CREATE_TIME_KEYS),
            update_time: time_field(m, UPDATE_TIME_KEYS),
            display_time: time_field(m, DISPLAY_TIME_KEYS),
            parent: str_field(m, &["parent"]),
            snippet: str_field(m, &["snippet"]),
            attachments: m
                .get("attachments")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Attachment::coerce).collect())
                .unwrap_or_default(),
            nodes,
        }
    }

    /// Memo-shaped JSON for this note; `from_value(to_payload())` is identity.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Lower-cased, `#`-stripped tag set used for predicate matching.
    pub fn normalized_tags(&self) -> BTreeSet<String> {
        self.tags.iter().filter_map(|t| normalize_tag(t)).collect()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn contains_text(&self, text: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.content.contains(text)
        } else {
            self.content.to_lowercase().contains(&text.to_lowercase())
        }
    }

    pub fn has_tag(&self, tag: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.tags.iter().any(|t| t == tag)
        } else {
            normalize_tag(tag).is_some_and(|wanted| self.normalized_tags().contains(&wanted))
        }
    }

    pub fn has_any_tags(&self, tags: &[&str], case_sensitive: bool) -> bool {
        tags.iter().any(|t| self.has_tag(t, case_sensitive))
    }

    pub fn has_all_tags(&self, tags: &[&str], case_sensitive: bool) -> bool {
        tags.iter().all(|t| self.has_tag(t, case_sensitive))
    }

    /// The numeric tail of the resource name (`memos/123` -> `123`).
    pub fn short_id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field coercion helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `"#Work "` -> `Some("work")`; blank tags -> `None`.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let t = tag.trim().trim_start_matches('#').trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_lowercase())
    }
}

/// Parse any of the accepted timestamp encodings. Unparsable -> `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_iso(s),
        Value::Number(n) => match n.as_i64() {
            Some(secs) => Utc.timestamp_opt(secs, 0).single(),
            None => n.as_f64().and_then(from_fractional_secs),
        },
        Value::Object(m) => {
            let secs = match m.get("seconds")? {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let nanos = m
                .get("nanos")
                .and_then(Value::as_u64)
                .filter(|n| *n < 1_000_000_000)
                .unwrap_or(0) as u32;
            Utc.timestamp_opt(secs, nanos).single()
        }
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive timestamps carry no offset; treat them as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_fractional_secs(f: f64) -> Option<DateTime<Utc>> {
    if !f.is_finite() {
        return None;
    }
    let secs = f.floor();
    let nanos = (((f - secs) * 1e9).round() as u32).min(999_999_999);
    Utc.timestamp_opt(secs as i64, nanos).single()
}

/// Depth-first scan for `TagNode` (or API-style `tagNode`) objects carrying a
/// `content` string. Wrapped `{"Node": {"TagNode": ..}}` forms are reached
/// by the recursion.
pub fn extract_node_tags(nodes: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk_tags(nodes, &mut out);
    out
}

fn walk_tags(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(m) => {
            for key in ["TagNode", "tagNode"] {
                if let Some(content) = m
                    .get(key)
                    .and_then(Value::as_object)
                    .and_then(|tag| tag.get("content"))
                    .and_then(Value::as_str)
                {
                    out.push(content.to_owned());
                }
            }
            for (key, v) in m {
                // Already handled above; descending would only re-read `content`.
                if key == "TagNode" || key == "tagNode" {
                    continue;
                }
                walk_tags(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_tags(item, out);
            }
        }
        _ => {}
    }
}

fn coerce_node_types(value: &mut Value) {
    match value {
        Value::Object(m) => {
            if let Some(code) = m.get("type").and_then(Value::as_i64) {
                m.insert("type".into(), Value::String(node_type_name(code)));
            }
            for v in m.values_mut() {
                coerce_node_types(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_node_types),
        _ => {}
    }
}

fn note_name(m: &Map<String, Value>) -> Option<String> {
    if let Some(name) = str_field(m, &["name"]) {
        return Some(name);
    }
    match m.get("id").or_else(|| m.get("uid"))? {
        Value::Number(n) => Some(format!("memos/{n}")),
        Value::String(s) if s.contains('/') => Some(s.clone()),
        Value::String(s) if !s.is_empty() => Some(format!("memos/{s}")),
        _ => None,
    }
}

fn str_field(m: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| m.get(*k).and_then(Value::as_str))
        .map(str::to_owned)
}

fn time_field(m: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|k| m.get(*k).filter(|v| !v.is_null()))
        .and_then(parse_timestamp)
}

fn dedup_preserving_order(tags: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    tags.retain(|t| seen.insert(t.clone()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default_safely() {
        let note = Note::from_value(&json!({}));
        assert_eq!(note.content, "");
        assert!(note.tags.is_empty());
        assert_eq!(note.visibility, Visibility::Private);
        assert_eq!(note.state, State::Normal);
        assert!(note.create_time.is_none());
    }

    #[test]
    fn non_object_yields_empty_note() {
        assert_eq!(Note::from_value(&json!([1, 2, 3])), Note::default());
        assert_eq!(Note::from_value(&json!("memo")), Note::default());
    }

    #[test]
    fn mixed_case_and_hash_tags_normalize() {
        let note = Note::from_value(&json!({ "tags": ["#Work", "work"] }));
        assert_eq!(note.tags, vec!["#Work", "work"]);
        let normalized: Vec<_> = note.normalized_tags().into_iter().collect();
        assert_eq!(normalized, vec!["work"]);
    }

    #[test]
    fn timestamp_encodings_agree() {
        let a = parse_timestamp(&json!({ "seconds": 1_700_000_000 }));
        let b = parse_timestamp(&json!("2023-11-14T22:13:20Z"));
        let c = parse_timestamp(&json!(1_700_000_000));
        let d = parse_timestamp(&json!("2023-11-14T23:13:20+01:00"));
        let e = parse_timestamp(&json!({ "seconds": "1700000000" }));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
        assert_eq!(d, e);
    }

    #[test]
    fn fractional_epoch_keeps_sub_second_precision() {
        let ts = parse_timestamp(&json!(1_700_000_000.5)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn malformed_timestamp_becomes_none() {
        let note = Note::from_value(&json!({ "createTime": "yesterday-ish", "updateTime": true }));
        assert!(note.create_time.is_none());
        assert!(note.update_time.is_none());
    }

    #[test]
    fn naive_iso_is_read_as_utc() {
        let ts = parse_timestamp(&json!("2023-11-14T22:13:20")).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn integer_enums_are_mapped() {
        let note = Note::from_value(&json!({ "visibility": 3, "state": 2 }));
        assert_eq!(note.visibility, Visibility::Public);
        assert_eq!(note.state, State::Archived);

        let odd = Note::from_value(&json!({ "visibility": 9, "state": "normal" }));
        assert_eq!(odd.visibility, Visibility::Unspecified);
        assert_eq!(odd.state, State::Normal);
    }

    #[test]
    fn node_types_are_named_and_unknown_codes_pass_through() {
        let note = Note::from_value(&json!({
            "nodes": [{ "type": 2, "children": [{ "type": 59 }] }, { "type": 999 }]
        }));
        let nodes = note.nodes.unwrap();
        assert_eq!(nodes[0]["type"], "PARAGRAPH");
        assert_eq!(nodes[0]["children"][0]["type"], "TAG");
        assert_eq!(nodes[1]["type"], "UNKNOWN_999");
    }

    #[test]
    fn tags_are_discovered_in_nested_nodes() {
        let note = Note::from_value(&json!({
            "tags": ["Inbox"],
            "nodes": [
                { "paragraphNode": { "children": [
                    { "type": "TAG", "tagNode": { "content": "cli" } }
                ]}},
                { "Node": { "TagNode": { "content": "Deep" } } },
                { "TagNode": { "content": "inbox" } }
            ]
        }));
        assert_eq!(note.tags, vec!["Inbox", "cli", "Deep", "inbox"]);
        let normalized: Vec<_> = note.normalized_tags().into_iter().collect();
        assert_eq!(normalized, vec!["cli", "deep", "inbox"]);
    }

    #[test]
    fn bare_creator_string_is_wrapped() {
        let note = Note::from_value(&json!({ "creator": "users/1" }));
        let creator = note.creator.unwrap();
        assert_eq!(creator.username.as_deref(), Some("users/1"));
        assert_eq!(creator.label(), "users/1");
    }

    #[test]
    fn numeric_id_becomes_resource_name() {
        let note = Note::from_value(&json!({ "id": 42 }));
        assert_eq!(note.name.as_deref(), Some("memos/42"));
        assert_eq!(note.short_id(), Some("42"));
    }

    #[test]
    fn renormalizing_a_normalized_note_is_identity() {
        let raw = json!({
            "name": "memos/7",
            "content": "ship it #release",
            "tags": ["Release"],
            "visibility": 2,
            "state": 1,
            "creator": "users/3",
            "createTime": { "seconds": 1_700_000_000 },
            "updateTime": 1_700_000_100.25,
            "attachments": [{ "filename": "a.png", "type": "image/png", "size": "12" }],
            "nodes": [{ "type": 59, "tagNode": { "content": "release" } }]
        });
        let once = Note::from_value(&raw);
        let twice = Note::from_value(&once.to_payload());
        assert_eq!(once, twice);
    }

    #[test]
    fn derived_properties() {
        let note = Note::from_value(&json!({
            "content": "Hello big   World",
            "tags": ["#Idea", "draft"]
        }));
        assert_eq!(note.word_count(), 3);
        assert!(note.has_tags());
        assert!(!note.has_attachments());
        assert!(note.contains_text("hello", false));
        assert!(!note.contains_text("hello", true));
        assert!(note.has_tag("idea", false));
        assert!(!note.has_tag("idea", true));
        assert!(note.has_any_tags(&["nope", "DRAFT"], false));
        assert!(!note.has_all_tags(&["idea", "nope"], false));
    }
}
