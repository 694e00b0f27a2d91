//! Activity resolution: header, then inline field, then timestamps.

use mt_domain::note::Note;
use serde::Serialize;

use crate::envelope::{header, Headers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Push,
    PullRequest,
    Any,
}

/// Checked in order; the first header whose value classifies wins.
pub const ACTIVITY_HEADERS: &[&str] = &[
    "x-memos-event",
    "x-event-type",
    "x-github-event",
    "x-webhook-event",
    "x-activity",
    "x-action",
];

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Any => "any",
        }
    }

    /// Map a free-form event name onto a keyword family.
    pub fn classify(value: &str) -> Option<Self> {
        let s = value.trim().to_lowercase();
        if s.is_empty() {
            return None;
        }
        let has = |needles: &[&str]| needles.iter().any(|n| s.contains(n));

        if has(&["creat", "new", "insert"]) {
            Some(Self::Create)
        } else if has(&["updat", "edit", "modif", "chang"]) {
            Some(Self::Update)
        } else if has(&["delet", "remov"]) {
            Some(Self::Delete)
        } else if has(&["push", "commit"]) {
            Some(Self::Push)
        } else if has(&["pull_request", "merge_request"]) || s == "pr" || s == "mr" {
            Some(Self::PullRequest)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn resolve_activity(note: &Note, headers: &Headers, inline_hint: Option<&str>) -> ActivityKind {
    if let Some(kind) = ACTIVITY_HEADERS
        .iter()
        .filter_map(|h| header(headers, h))
        .find_map(ActivityKind::classify)
    {
        return kind;
    }

    if let Some(kind) = inline_hint.and_then(ActivityKind::classify) {
        return kind;
    }

    match (note.create_time, note.update_time) {
        (Some(created), Some(updated)) if created == updated => ActivityKind::Create,
        (Some(created), Some(updated)) if updated > created => ActivityKind::Update,
        _ => ActivityKind::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn keyword_families() {
        assert_eq!(ActivityKind::classify("memos.memo.created"), Some(ActivityKind::Create));
        assert_eq!(ActivityKind::classify("INSERT"), Some(ActivityKind::Create));
        assert_eq!(ActivityKind::classify("edited"), Some(ActivityKind::Update));
        assert_eq!(ActivityKind::classify("removed"), Some(ActivityKind::Delete));
        assert_eq!(ActivityKind::classify("commit"), Some(ActivityKind::Push));
        assert_eq!(ActivityKind::classify("merge_request"), Some(ActivityKind::PullRequest));
        assert_eq!(ActivityKind::classify("PR"), Some(ActivityKind::PullRequest));
        assert_eq!(ActivityKind::classify("print"), None);
        assert_eq!(ActivityKind::classify("ping"), None);
    }

    #[test]
    fn header_beats_inline_hint() {
        let h = headers(&[("X-GitHub-Event", "push")]);
        assert_eq!(resolve_activity(&Note::default(), &h, Some("create")), ActivityKind::Push);
    }

    #[test]
    fn unclassifiable_header_falls_through() {
        let h = headers(&[("x-memos-event", "ping"), ("x-action", "deleted")]);
        assert_eq!(resolve_activity(&Note::default(), &h, None), ActivityKind::Delete);

        let h = headers(&[("x-memos-event", "ping")]);
        assert_eq!(resolve_activity(&Note::default(), &h, Some("update")), ActivityKind::Update);
    }

    #[test]
    fn timestamps_decide_when_nothing_explicit() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        let mut note = Note {
            create_time: Some(t0),
            update_time: Some(t0),
            ..Note::default()
        };
        assert_eq!(resolve_activity(&note, &Headers::new(), None), ActivityKind::Create);
        note.update_time = Some(t1);
        assert_eq!(resolve_activity(&note, &Headers::new(), None), ActivityKind::Update);
        note.update_time = None;
        assert_eq!(resolve_activity(&note, &Headers::new(), None), ActivityKind::Any);
    }
}
