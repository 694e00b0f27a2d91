use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mt_domain::config::IndexConfig;
use mt_domain::error::Result;
use mt_domain::note::{normalize_tag, Visibility};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::registry::{EventHandler, MemoEvent};

pub const INDEX_FILE: &str = "memo_index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub action: String,
    pub word_count: usize,
    pub visibility: Visibility,
    pub indexed_at: DateTime<Utc>,
}

/// JSON-file search index keyed by note name.
///
/// Writes are serialized through an async mutex; the whole file is
/// rewritten on every upsert.
pub struct SearchIndex {
    file: PathBuf,
    lock: Mutex<()>,
}

impl SearchIndex {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            file: dir.as_ref().join(INDEX_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(cfg: &IndexConfig) -> Self {
        Self::new(&cfg.path)
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Missing or corrupt index files read as empty.
    async fn load(&self) -> BTreeMap<String, IndexEntry> {
        match tokio::fs::read(&self.file).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %self.file.display(), error = %e, "unreadable search index; starting fresh");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    pub async fn upsert(&self, event: &MemoEvent) -> Result<IndexEntry> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        let note = &event.note;
        let id = note
            .name
            .clone()
            .unwrap_or_else(|| format!("memo_{}", now.timestamp_millis()));
        let entry = IndexEntry {
            id: id.clone(),
            content: note.content.clone(),
            tags: note.tags.clone(),
            created: note.create_time.unwrap_or(now),
            action: event.activity.as_str().to_owned(),
            word_count: note.word_count(),
            visibility: note.visibility,
            indexed_at: now,
        };

        let mut index = self.load().await;
        index.insert(id, entry.clone());
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.file, serde_json::to_vec_pretty(&index)?).await?;
        Ok(entry)
    }

    /// Case-insensitive substring match on content (empty query matches
    /// all), optionally restricted to entries carrying any of `tags`.
    /// Newest first.
    pub async fn search(&self, query: &str, tags: &[String]) -> Vec<IndexEntry> {
        let _guard = self.lock.lock().await;
        let query = query.to_lowercase();
        let wanted: Vec<String> = tags.iter().filter_map(|t| normalize_tag(t)).collect();

        let mut hits: Vec<IndexEntry> = self
            .load()
            .await
            .into_values()
            .filter(|e| query.is_empty() || e.content.to_lowercase().contains(&query))
            .filter(|e| {
                wanted.is_empty()
                    || e.tags
                        .iter()
                        .filter_map(|t| normalize_tag(t))
                        .any(|t| wanted.contains(&t))
            })
            .collect();
        hits.sort_by(|a, b| b.created.cmp(&a.created));
        hits
    }
}

#[async_trait]
impl EventHandler for SearchIndex {
    fn name(&self) -> &str {
        "index"
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        let entry = self.upsert(event).await?;
        tracing::debug!(id = %entry.id, words = entry.word_count, "memo indexed");
        Ok(())
    }
}
