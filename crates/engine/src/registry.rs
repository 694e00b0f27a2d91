//! Event type registry.
//!
//! Event types are registered explicitly at startup into a
//! [`RegistryBuilder`]; iteration order is registration order.

use std::cell::OnceCell;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mt_domain::error::{Error, Result};
use mt_domain::note::{Actor, Note};
use serde::Serialize;
use serde_json::Value;

use crate::activity::ActivityKind;
use crate::envelope::{normalize, Headers, NormalizedPayload};
use crate::predicate::PredicateSpec;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Triggers and handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    OnCreate,
    OnUpdate,
    OnDelete,
    OnAny,
    /// Fires when the resolved activity has exactly this name.
    OnActivity(String),
}

impl Trigger {
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        match s.strip_prefix("on_").unwrap_or(&s) {
            "create" => Self::OnCreate,
            "update" => Self::OnUpdate,
            "delete" => Self::OnDelete,
            "any" | "" | "*" => Self::OnAny,
            other => Self::OnActivity(other.to_owned()),
        }
    }

    pub fn fires(&self, activity: ActivityKind) -> bool {
        match self {
            Self::OnCreate => activity == ActivityKind::Create,
            Self::OnUpdate => activity == ActivityKind::Update,
            Self::OnDelete => activity == ActivityKind::Delete,
            Self::OnAny => true,
            Self::OnActivity(name) => activity.as_str() == name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::OnCreate => "create",
            Self::OnUpdate => "update",
            Self::OnDelete => "delete",
            Self::OnAny => "any",
            Self::OnActivity(name) => name,
        }
    }
}

/// A matched note bound to the event type that matched it.
#[derive(Debug, Clone)]
pub struct MemoEvent {
    pub type_name: String,
    pub note: Note,
    pub previous: Option<Note>,
    pub actor: Option<Actor>,
    pub activity: ActivityKind,
    pub headers: Headers,
    pub raw: Value,
}

impl MemoEvent {
    pub fn new(type_name: &str, normalized: &NormalizedPayload, activity: ActivityKind, headers: &Headers, raw: &Value) -> Self {
        Self {
            type_name: type_name.to_owned(),
            note: normalized.note.clone(),
            previous: normalized.previous.clone(),
            actor: normalized.actor.clone(),
            activity,
            headers: headers.clone(),
            raw: raw.clone(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &MemoEvent) -> Result<()>;
}

/// Closure-backed handler, mostly for tests and one-off wiring.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(MemoEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(MemoEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        (self.f)(event.clone()).await
    }
}

#[derive(Clone)]
pub struct Binding {
    pub trigger: Trigger,
    pub handler: Arc<dyn EventHandler>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event type definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct EventTypeDefinition {
    pub name: String,
    pub predicates: PredicateSpec,
    pub handlers: Vec<Binding>,
    pub is_abstract: bool,
}

impl EventTypeDefinition {
    pub fn new(name: impl Into<String>, predicates: PredicateSpec) -> Self {
        Self {
            name: name.into(),
            predicates,
            handlers: Vec::new(),
            is_abstract: false,
        }
    }

    /// A predicate template that never matches on its own.
    pub fn abstract_template(name: impl Into<String>, predicates: PredicateSpec) -> Self {
        Self {
            is_abstract: true,
            ..Self::new(name, predicates)
        }
    }

    /// Concrete type inheriting this definition's predicates, without handlers.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.predicates.clone())
    }

    pub fn on(mut self, trigger: Trigger, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(Binding { trigger, handler });
        self
    }

    /// Both phases: shallow prefilter on the raw payload, then the full
    /// predicate set against the normalized note. `normalized` is filled on
    /// first use and shared across every type checked for one payload.
    pub fn matches(&self, raw: &Value, normalized: &OnceCell<Option<NormalizedPayload>>) -> bool {
        if self.is_abstract || !self.predicates.prefilter(raw) {
            return false;
        }
        normalized
            .get_or_init(|| normalize(raw))
            .as_ref()
            .is_some_and(|n| self.predicates.matches_note(&n.note))
    }
}

impl std::fmt::Debug for EventTypeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeDefinition")
            .field("name", &self.name)
            .field("predicates", &self.predicates)
            .field("handlers", &self.handlers.len())
            .field("is_abstract", &self.is_abstract)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct RegistryBuilder {
    types: Vec<EventTypeDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: EventTypeDefinition) -> Result<&mut Self> {
        if def.name.trim().is_empty() {
            return Err(Error::Validation("event type name must not be empty".into()));
        }
        if self.types.iter().any(|t| t.name == def.name) {
            return Err(Error::Validation(format!(
                "event type {:?} is already registered",
                def.name
            )));
        }
        tracing::debug!(
            event_type = %def.name,
            handlers = def.handlers.len(),
            is_abstract = def.is_abstract,
            "registered event type"
        );
        self.types.push(def);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry { types: self.types }
    }
}

pub struct Registry {
    types: Vec<EventTypeDefinition>,
}

/// Serializable summary for listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct EventTypeSummary {
    pub name: String,
    pub is_abstract: bool,
    pub any_tags: Vec<String>,
    pub all_tags: Vec<String>,
    pub content_contains: Option<String>,
    pub content_pattern: Option<String>,
    pub handlers: Vec<String>,
}

impl Registry {
    pub fn iter(&self) -> impl Iterator<Item = &EventTypeDefinition> {
        self.types.iter()
    }

    pub fn get(&self, name: &str) -> Option<&EventTypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn describe(&self) -> Vec<EventTypeSummary> {
        self.types
            .iter()
            .map(|t| EventTypeSummary {
                name: t.name.clone(),
                is_abstract: t.is_abstract,
                any_tags: t.predicates.any_tags.iter().cloned().collect(),
                all_tags: t.predicates.all_tags.iter().cloned().collect(),
                content_contains: t.predicates.content_contains.clone(),
                content_pattern: t.predicates.content_pattern.as_ref().map(|r| r.as_str().to_owned()),
                handlers: t
                    .handlers
                    .iter()
                    .map(|b| format!("{}@{}", b.handler.name(), b.trigger.label()))
                    .collect(),
            })
            .collect()
    }
}
