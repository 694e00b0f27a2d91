use serde::{Deserialize, Serialize};

use crate::note::Visibility;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Declarative event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Register the `#cli` command runner (tag-triggered, on create).
    #[serde(default = "d_true")]
    pub builtin_cli: bool,
    /// Additional event types, registered in file order.
    #[serde(default)]
    pub rules: Vec<EventRuleConfig>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            builtin_cli: true,
            rules: Vec::new(),
        }
    }
}

/// One `[[events.rules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRuleConfig {
    pub name: String,
    #[serde(default)]
    pub any_tags: Vec<String>,
    #[serde(default)]
    pub all_tags: Vec<String>,
    #[serde(default)]
    pub content_contains: Option<String>,
    #[serde(default)]
    pub content_pattern: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub min_word_count: Option<usize>,
    #[serde(default)]
    pub handlers: Vec<RuleHandlerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleHandlerConfig {
    /// `create`, `update`, `delete`, `any`, or any other activity name.
    #[serde(default = "d_any")]
    pub on: String,
    pub action: HandlerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerAction {
    RunCli,
    SaveFile,
    Notify,
    Index,
    Log,
}

impl HandlerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunCli => "run_cli",
            Self::SaveFile => "save_file",
            Self::Notify => "notify",
            Self::Index => "index",
            Self::Log => "log",
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_any() -> String {
    "any".into()
}
