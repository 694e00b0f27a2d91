use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedded command directives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectivesConfig {
    /// Token that starts a directive line (matched case-insensitively).
    #[serde(default = "d_marker")]
    pub marker: String,
    /// Character directly after the marker that marks allow-failure.
    #[serde(default = "d_bang")]
    pub bang: String,
    /// Maximum characters per posted comment chunk.
    #[serde(default = "d_15000")]
    pub max_comment_chars: usize,
    #[serde(default = "d_title")]
    pub comment_title: String,
    /// Tag that routes a note to the built-in command runner.
    #[serde(default = "d_tag")]
    pub trigger_tag: String,
}

impl Default for DirectivesConfig {
    fn default() -> Self {
        Self {
            marker: d_marker(),
            bang: d_bang(),
            max_comment_chars: 15_000,
            comment_title: d_title(),
            trigger_tag: d_tag(),
        }
    }
}

fn d_marker() -> String {
    "#cli".into()
}
fn d_bang() -> String {
    "!".into()
}
fn d_15000() -> usize {
    15_000
}
fn d_title() -> String {
    "CLI Results".into()
}
fn d_tag() -> String {
    "cli".into()
}
