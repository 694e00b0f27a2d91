//! Declarative matching conditions for one event type.

use std::collections::BTreeSet;

use mt_domain::config::EventRuleConfig;
use mt_domain::error::{Error, Result};
use mt_domain::note::{extract_node_tags, normalize_tag, Note, Visibility};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::envelope::Envelope;

/// Conditions are conjunctive; an empty spec matches every note.
#[derive(Debug, Clone, Default)]
pub struct PredicateSpec {
    pub any_tags: BTreeSet<String>,
    pub all_tags: BTreeSet<String>,
    pub content_contains: Option<String>,
    pub content_pattern: Option<Regex>,
    pub visibility: Option<Visibility>,
    pub min_word_count: Option<usize>,
}

fn tag_set<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())).collect()
}

/// Compiled once; searched, never anchored.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| Error::Validation(format!("content_pattern {pattern:?}: {e}")))
}

impl PredicateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.any_tags = tag_set(tags);
        self
    }

    pub fn all_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.all_tags = tag_set(tags);
        self
    }

    pub fn content_contains(mut self, needle: impl Into<String>) -> Self {
        let needle: String = needle.into();
        self.content_contains = (!needle.is_empty()).then(|| needle.to_lowercase());
        self
    }

    pub fn content_pattern(mut self, pattern: &str) -> Result<Self> {
        self.content_pattern = Some(compile_pattern(pattern)?);
        Ok(self)
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn min_word_count(mut self, n: usize) -> Self {
        self.min_word_count = Some(n);
        self
    }

    pub fn from_rule(rule: &EventRuleConfig) -> Result<Self> {
        let mut spec = Self::new()
            .any_tags(&rule.any_tags)
            .all_tags(&rule.all_tags);
        if let Some(ref needle) = rule.content_contains {
            spec = spec.content_contains(needle.as_str());
        }
        if let Some(ref pattern) = rule.content_pattern {
            spec = spec.content_pattern(pattern)?;
        }
        spec.visibility = rule.visibility;
        spec.min_word_count = rule.min_word_count;
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.any_tags.is_empty()
            && self.all_tags.is_empty()
            && self.content_contains.is_none()
            && self.content_pattern.is_none()
            && self.visibility.is_none()
            && self.min_word_count.is_none()
    }

    fn has_shallow_predicates(&self) -> bool {
        !self.any_tags.is_empty()
            || !self.all_tags.is_empty()
            || self.content_contains.is_some()
            || self.content_pattern.is_some()
    }

    fn content_passes(&self, content: &str) -> bool {
        if let Some(ref needle) = self.content_contains {
            if !content.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ref re) = self.content_pattern {
            if !re.is_match(content) {
                return false;
            }
        }
        true
    }

    fn tags_pass(&self, tags: &BTreeSet<String>) -> bool {
        if !self.any_tags.is_empty() && self.any_tags.is_disjoint(tags) {
            return false;
        }
        self.all_tags.is_subset(tags)
    }

    /// Cheap check against the raw payload. Reads the same memo object the
    /// normalizer would, so a payload rejected here would also fail
    /// [`Self::matches_note`].
    pub fn prefilter(&self, raw: &Value) -> bool {
        if !self.has_shallow_predicates() {
            return true;
        }
        let Some(envelope) = Envelope::locate(raw) else {
            return false;
        };
        let memo = envelope.memo();

        let content = memo.get("content").and_then(Value::as_str).unwrap_or("");
        if !self.content_passes(content) {
            return false;
        }

        if self.any_tags.is_empty() && self.all_tags.is_empty() {
            return true;
        }
        let mut tags: BTreeSet<String> = memo
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| tag_set(arr.iter().filter_map(Value::as_str)))
            .unwrap_or_default();
        if let Some(nodes) = memo.get("nodes") {
            tags.extend(tag_set(extract_node_tags(nodes)));
        }
        self.tags_pass(&tags)
    }

    pub fn matches_note(&self, note: &Note) -> bool {
        if !self.tags_pass(&note.normalized_tags()) || !self.content_passes(&note.content) {
            return false;
        }
        if self.visibility.is_some_and(|v| v != note.visibility) {
            return false;
        }
        if self.min_word_count.is_some_and(|n| note.word_count() < n) {
            return false;
        }
        true
    }
}
