use async_trait::async_trait;
use mt_domain::error::Result;

use crate::registry::{EventHandler, MemoEvent};

const PREVIEW_CHARS: usize = 100;

/// Logs every matched note.
#[derive(Debug, Default)]
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        let preview: String = event.note.content.chars().take(PREVIEW_CHARS).collect();
        tracing::info!(
            event_type = %event.type_name,
            activity = %event.activity,
            note = ?event.note.name,
            actor = event.actor.as_ref().map(|a| a.label()).unwrap_or("unknown"),
            tags = ?event.note.tags,
            words = event.note.word_count(),
            preview = %preview,
            "memo event"
        );
        Ok(())
    }
}
