//! Dispatch engine: match every registered type, then run its handlers.

use std::cell::OnceCell;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use mt_domain::trace::TraceEvent;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::activity::{resolve_activity, ActivityKind};
use crate::envelope::{Headers, NormalizedPayload};
use crate::registry::{Binding, MemoEvent, Registry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerError {
    pub type_name: String,
    pub handler_name: String,
    pub message: String,
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.type_name, self.handler_name, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub success: bool,
    pub matched_types: Vec<String>,
    /// `Type.handler` for every handler invoked, including ones that failed.
    pub triggered_handlers: Vec<String>,
    pub errors: Vec<HandlerError>,
    pub activity: Option<ActivityKind>,
    pub processing_time_seconds: f64,
}

impl DispatchResult {
    fn empty(started: Instant) -> Self {
        Self {
            success: true,
            matched_types: Vec::new(),
            triggered_handlers: Vec::new(),
            errors: Vec::new(),
            activity: None,
            processing_time_seconds: started.elapsed().as_secs_f64(),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, handler_timeout: Duration) -> Self {
        Self {
            registry,
            handler_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Never fails: malformed payloads produce an empty successful result.
    pub async fn dispatch(&self, raw: &Value, headers: &Headers) -> DispatchResult {
        let started = Instant::now();

        let Some((payload, matched)) = self.match_types(raw) else {
            return DispatchResult::empty(started);
        };

        let activity = resolve_activity(&payload.note, headers, payload.inline_activity.as_deref());
        let mut result = DispatchResult {
            activity: Some(activity),
            ..DispatchResult::empty(started)
        };

        for (type_name, bindings) in matched {
            TraceEvent::EventMatched {
                event_type: type_name.clone(),
                activity: activity.as_str().to_owned(),
                note: payload.note.name.clone(),
            }
            .emit();

            let event = MemoEvent::new(&type_name, &payload, activity, headers, raw);
            for binding in bindings.iter().filter(|b| b.trigger.fires(activity)) {
                let handler_name = binding.handler.name().to_owned();
                result.triggered_handlers.push(format!("{type_name}.{handler_name}"));

                if let Err(message) = self.invoke(binding, &event).await {
                    tracing::warn!(
                        event_type = %type_name,
                        handler = %handler_name,
                        error = %message,
                        "handler failed"
                    );
                    TraceEvent::HandlerFailed {
                        event_type: type_name.clone(),
                        handler: handler_name.clone(),
                        error: message.clone(),
                    }
                    .emit();
                    result.errors.push(HandlerError {
                        type_name: type_name.clone(),
                        handler_name,
                        message,
                    });
                }
            }
            result.matched_types.push(type_name);
        }

        result.success = result.errors.is_empty();
        result.processing_time_seconds = started.elapsed().as_secs_f64();

        TraceEvent::WebhookDispatched {
            matched_types: result.matched_types.len(),
            triggered_handlers: result.triggered_handlers.len(),
            errors: result.errors.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        result
    }

    /// The normalized payload plus the bindings of every matching type, or
    /// `None` when nothing matched. The payload is normalized at most once.
    fn match_types(&self, raw: &Value) -> Option<(NormalizedPayload, Vec<(String, Vec<Binding>)>)> {
        let normalized: OnceCell<Option<NormalizedPayload>> = OnceCell::new();
        let mut matched = Vec::new();
        for def in self.registry.iter() {
            if def.matches(raw, &normalized) {
                matched.push((def.name.clone(), def.handlers.clone()));
            } else if matches!(normalized.get(), Some(None)) {
                break;
            }
        }
        if matched.is_empty() {
            return None;
        }
        normalized.into_inner().flatten().map(|payload| (payload, matched))
    }

    /// Error, timeout and panic all come back as a message.
    async fn invoke(&self, binding: &Binding, event: &MemoEvent) -> Result<(), String> {
        let span = tracing::info_span!(
            "handler",
            event_type = %event.type_name,
            handler = %binding.handler.name()
        );
        let fut = AssertUnwindSafe(binding.handler.handle(event)).catch_unwind();
        match tokio::time::timeout(self.handler_timeout, fut).instrument(span).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(panic)) => Err(format!("panicked: {}", panic_message(&*panic))),
            Err(_) => Err(format!(
                "timed out after {}s",
                self.handler_timeout.as_secs_f64()
            )),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
