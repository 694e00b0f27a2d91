//! The `NoteApi` trait defines the interface to the note service
//! (REST, test double).

use async_trait::async_trait;
use mt_domain::error::Result;
use mt_domain::note::{Note, Visibility};

/// Abstraction over the note-service API surface the engine needs.
///
/// Errors are categorized so callers can tell auth failures
/// ([`Error::Auth`](mt_domain::error::Error::Auth)) and missing parents
/// ([`Error::NotFound`](mt_domain::error::Error::NotFound)) apart from
/// everything else.
#[async_trait]
pub trait NoteApi: Send + Sync {
    /// Whether credentials are available. Unconfigured clients are never
    /// asked to write.
    fn is_configured(&self) -> bool {
        true
    }

    /// Create a comment (child note) under `parent` (POST /api/v1/{parent}/comments).
    async fn create_comment(&self, parent: &str, content: &str, visibility: Visibility) -> Result<Note>;

    /// Fetch a note by resource name (GET /api/v1/{name}). `Ok(None)` on 404.
    async fn get_note(&self, name: &str) -> Result<Option<Note>>;

    /// List notes, optionally filtered (GET /api/v1/memos).
    async fn list_notes(&self, filter: Option<&str>, page_size: Option<u32>) -> Result<Vec<Note>>;

    /// Liveness of the upstream service.
    async fn health(&self) -> Result<bool>;
}
