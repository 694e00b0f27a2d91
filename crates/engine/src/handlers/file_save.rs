use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use mt_domain::config::{FileSaveConfig, OrganizeBy};
use mt_domain::error::{Error, Result};
use mt_domain::note::Note;

use crate::registry::{EventHandler, MemoEvent};

const MAX_NAME_CHARS: usize = 50;
const LONG_FORM_WORDS: usize = 200;
const TODO_MARKERS: &[&str] = &["- [ ]", "- [x]", "* [ ]", "* [x]"];
const SOURCE: &str = "memos_webhook";

/// YAML header written above the note body.
#[derive(Debug, Serialize)]
struct FrontMatter<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
    visibility: String,
    created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    creator: Option<&'a str>,
    source: &'static str,
    action: &'static str,
}

/// Writes matched notes to disk as Markdown.
pub struct FileSaveHandler {
    cfg: FileSaveConfig,
}

/// Filesystem-safe version of `name`: reserved characters and whitespace
/// runs collapse to a single `_`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let sep = c == '_' || c.is_whitespace() || "<>:\"/\\|?*".contains(c);
        if !sep {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_owned()
}

impl FileSaveHandler {
    pub fn new(cfg: FileSaveConfig) -> Self {
        Self { cfg }
    }

    pub fn save_dir(&self, note: &Note, now: DateTime<Utc>) -> PathBuf {
        let base = &self.cfg.base_path;
        match self.cfg.organize_by {
            OrganizeBy::Date => base.join(note.create_time.unwrap_or(now).format("%Y/%m").to_string()),
            OrganizeBy::Tags => {
                let tag = note
                    .tags
                    .first()
                    .map(|t| sanitize_filename(t))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "untagged".to_owned());
                base.join("by_tag").join(tag)
            }
            OrganizeBy::ContentType => base.join(content_bucket(note)),
            OrganizeBy::Flat => base.clone(),
        }
    }

    pub fn file_name(&self, note: &Note, now: DateTime<Utc>) -> String {
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
        let mut memo_name = sanitize_filename(note.name.as_deref().unwrap_or("untitled"));
        if memo_name.chars().count() > MAX_NAME_CHARS {
            memo_name = memo_name.chars().take(MAX_NAME_CHARS - 3).collect::<String>() + "...";
        }
        let memo_id = note
            .short_id()
            .map(sanitize_filename)
            .unwrap_or_else(|| timestamp.clone());
        self.cfg
            .filename_pattern
            .replace("{timestamp}", &timestamp)
            .replace("{memo_name}", &memo_name)
            .replace("{memo_id}", &memo_id)
    }

    pub fn render(&self, event: &MemoEvent, now: DateTime<Utc>) -> Result<String> {
        let note = &event.note;
        let mut lines: Vec<String> = Vec::new();

        if self.cfg.include_metadata {
            let front = FrontMatter {
                title: note.name.as_deref().unwrap_or("Untitled"),
                tags: note.tags.iter().map(String::as_str).collect(),
                visibility: note.visibility.to_string(),
                created: note.create_time.unwrap_or(now).to_rfc3339(),
                creator: note.creator.as_ref().map(|c| c.label()),
                source: SOURCE,
                action: event.activity.as_str(),
            };
            let yaml = serde_yaml::to_string(&front)
                .map_err(|e| Error::Other(format!("front matter: {e}")))?;
            lines.push("---".into());
            lines.push(yaml.trim_end().to_owned());
            lines.push("---".into());
            lines.push(String::new());
        }

        lines.push(note.content.clone());

        if !note.attachments.is_empty() {
            lines.push(String::new());
            lines.push("## Attachments".into());
            for a in &note.attachments {
                match a.external_link.as_deref().filter(|l| !l.is_empty()) {
                    Some(link) => lines.push(format!("- [{}]({link})", a.filename)),
                    None => lines.push(format!("- {} ({})", a.filename, a.kind)),
                }
            }
        }

        Ok(lines.join("\n"))
    }

    pub async fn save(&self, event: &MemoEvent, now: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.save_dir(&event.note, now);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(self.file_name(&event.note, now));
        tokio::fs::write(&path, self.render(event, now)?).await?;
        Ok(path)
    }
}

fn content_bucket(note: &Note) -> &'static str {
    let content = &note.content;
    if note.has_attachments() {
        "with_attachments"
    } else if note.word_count() > LONG_FORM_WORDS {
        "long_form"
    } else if TODO_MARKERS.iter().any(|m| content.contains(m)) {
        "todo_lists"
    } else if content.matches('#').count() > 3 {
        "structured"
    } else {
        "notes"
    }
}

#[async_trait]
impl EventHandler for FileSaveHandler {
    fn name(&self) -> &str {
        "save_file"
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        let path = self.save(event, Utc::now()).await?;
        tracing::info!(note = ?event.note.name, path = %path.display(), "memo saved");
        Ok(())
    }
}
