//! `mt-engine`: webhook matching and dispatch.
//!
//! A raw payload flows through:
//!
//! 1. [`envelope::normalize`] locates the memo inside whatever wrapper the
//!    sender used and folds it into a [`Note`](mt_domain::note::Note).
//! 2. Each registered [`EventTypeDefinition`] checks its [`PredicateSpec`]
//!    (cheap prefilter on the raw JSON, then the normalized note).
//! 3. [`activity::resolve_activity`] decides create/update/delete/...
//! 4. [`Dispatcher`] invokes every handler whose [`Trigger`] fires, one at a
//!    time, and records failures without stopping.

pub mod activity;
pub mod dispatch;
pub mod envelope;
pub mod handlers;
pub mod predicate;
pub mod registry;
pub mod reporter;

#[cfg(test)]
pub(crate) mod test_log;

pub use activity::{resolve_activity, ActivityKind};
pub use dispatch::{DispatchResult, Dispatcher, HandlerError};
pub use envelope::{normalize, Envelope, Headers, NormalizedPayload};
pub use predicate::PredicateSpec;
pub use registry::{
    handler_fn, Binding, EventHandler, EventTypeDefinition, EventTypeSummary, MemoEvent, Registry,
    RegistryBuilder, Trigger,
};
pub use reporter::{PostOutcome, ResultReporter};
