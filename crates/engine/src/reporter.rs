//! Posts command results back to the originating note as comments.

use std::sync::Arc;

use mt_domain::config::DirectivesConfig;
use mt_domain::note::Visibility;
use mt_domain::trace::TraceEvent;
use mt_notes::NoteApi;
use mt_sandbox::CommandResult;
use serde::Serialize;

/// Result of one chunk post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PostOutcome {
    /// Resource name of the created comment.
    Posted(String),
    /// Inline failure marker, e.g. `<auth failed: ..>`.
    Failed(String),
}

impl PostOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted(_))
    }
}

/// One rendered result. Always ends with a newline.
pub fn render_block(result: &CommandResult) -> String {
    let status = if result.succeeded() {
        "OK".to_owned()
    } else {
        format!("ERR({})", result.exit_code)
    };
    let timing = result
        .duration_secs
        .map(|d| format!(" in {d:.2}s"))
        .unwrap_or_default();
    format!(
        "$ {}\n[{status}{timing}]\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        result.command,
        result.stdout.trim_end(),
        result.stderr.trim_end(),
    )
}

/// Greedy packing into the fewest chunks of at most `max_chars` characters.
/// A block is never split; one larger than `max_chars` gets a chunk of its
/// own. Concatenating the chunks gives back the concatenated blocks.
pub fn chunk_blocks(blocks: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for block in blocks {
        let len = block.chars().count();
        if !current.is_empty() && current_len + len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(block);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn format_comment(title: &str, body: &str, index: usize, total: usize) -> String {
    let heading = if total > 1 {
        format!("{title} ({index}/{total})")
    } else {
        title.to_owned()
    };
    format!("**{heading}**\n\n```\n{}\n```\n", body.trim_end())
}

pub struct ResultReporter {
    notes: Arc<dyn NoteApi>,
    max_chars: usize,
    title: String,
    visibility: Visibility,
}

impl ResultReporter {
    pub fn new(notes: Arc<dyn NoteApi>, max_chars: usize, title: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            notes,
            max_chars: max_chars.max(1),
            title: title.into(),
            visibility,
        }
    }

    pub fn from_config(notes: Arc<dyn NoteApi>, cfg: &DirectivesConfig, visibility: Visibility) -> Self {
        Self::new(notes, cfg.max_comment_chars, cfg.comment_title.clone(), visibility)
    }

    /// Returns one outcome per attempted chunk; empty when reporting was
    /// skipped.
    pub async fn report(&self, parent: Option<&str>, results: &[CommandResult]) -> Vec<PostOutcome> {
        let Some(parent) = parent.filter(|p| !p.trim().is_empty()) else {
            tracing::info!("no parent note; skipping result report");
            return Vec::new();
        };
        if !self.notes.is_configured() {
            tracing::info!(parent, "note API not configured; skipping result report");
            return Vec::new();
        }
        if results.is_empty() {
            return Vec::new();
        }

        let blocks: Vec<String> = results.iter().map(render_block).collect();
        let chunks = chunk_blocks(&blocks, self.max_chars);
        let total = chunks.len();

        let mut outcomes = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let content = format_comment(&self.title, chunk, i + 1, total);
            let outcome = match self.notes.create_comment(parent, &content, self.visibility).await {
                Ok(note) => PostOutcome::Posted(note.name.unwrap_or_default()),
                Err(e) => {
                    tracing::warn!(parent, chunk = i + 1, total, error = %e, "failed to post result comment");
                    PostOutcome::Failed(e.marker())
                }
            };
            TraceEvent::CommentPosted {
                parent: parent.to_owned(),
                chunk: i + 1,
                total,
                ok: outcome.is_posted(),
            }
            .emit();
            outcomes.push(outcome);
        }
        outcomes
    }
}
