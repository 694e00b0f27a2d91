use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch + built-in handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Hard limit for a single handler invocation (seconds).
    #[serde(default = "d_300")]
    pub handler_timeout_sec: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_sec: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlersConfig {
    #[serde(default)]
    pub file_save: FileSaveConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizeBy {
    #[default]
    Date,
    Tags,
    ContentType,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSaveConfig {
    #[serde(default = "d_saved")]
    pub base_path: PathBuf,
    #[serde(default)]
    pub organize_by: OrganizeBy,
    /// Placeholders: `{timestamp}`, `{memo_name}`, `{memo_id}`.
    #[serde(default = "d_pattern")]
    pub filename_pattern: String,
    #[serde(default = "d_true")]
    pub include_metadata: bool,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        Self {
            base_path: d_saved(),
            organize_by: OrganizeBy::Date,
            filename_pattern: d_pattern(),
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    Console,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "d_channels")]
    pub channels: Vec<NotifyChannel>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channels: d_channels(),
            webhook_url: None,
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "d_index")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { path: d_index() }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_300() -> u64 {
    300
}
fn d_5000() -> u64 {
    5000
}
fn d_true() -> bool {
    true
}
fn d_saved() -> PathBuf {
    PathBuf::from("./saved_memos")
}
fn d_pattern() -> String {
    "{timestamp}_{memo_name}.md".into()
}
fn d_channels() -> Vec<NotifyChannel> {
    vec![NotifyChannel::Console]
}
fn d_index() -> PathBuf {
    PathBuf::from("./memo_index")
}
