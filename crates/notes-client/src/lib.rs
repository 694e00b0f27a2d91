//! `mt-notes`: client for the upstream note service (Memos API v1).
//!
//! Provides the [`NoteApi`] trait the engine talks to, a production REST
//! implementation ([`RestNoteClient`]) and the wire DTOs.
//!
//! ```rust,no_run
//! use mt_domain::config::NotesApiConfig;
//! use mt_domain::note::Visibility;
//! use mt_notes::{NoteApi, RestNoteClient};
//!
//! # async fn example() -> mt_domain::error::Result<()> {
//! let client = RestNoteClient::new(&NotesApiConfig::default())?;
//! let comment = client
//!     .create_comment("memos/42", "**CLI Results**", Visibility::Private)
//!     .await?;
//! println!("posted {:?}", comment.name);
//! # Ok(())
//! # }
//! ```

pub mod provider;
pub mod rest;
pub mod types;

pub use provider::NoteApi;
pub use rest::{from_reqwest, RestNoteClient};
pub use types::{CreateCommentRequest, ListNotesResponse};

use std::sync::Arc;

use mt_domain::config::NotesApiConfig;
use mt_domain::error::Result;

/// Build the shared [`NoteApi`] handle from config.
///
/// A missing token is not an error: the client is still returned but
/// reports [`NoteApi::is_configured`] as `false`, and callers skip
/// write-back.
pub fn create_client(cfg: &NotesApiConfig) -> Result<Arc<dyn NoteApi>> {
    let client = RestNoteClient::new(cfg)?;
    if !client.is_configured() {
        tracing::warn!(
            token_env = %cfg.token_env,
            "note API token not set; results will not be posted back"
        );
    } else {
        tracing::info!(base_url = %client.base_url(), "note API client ready");
    }
    Ok(Arc::new(client))
}
