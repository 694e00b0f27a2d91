//! Directive extraction: one command per `#cli` line.
//!
//! ```text
//! #cli echo hello          -> ("echo hello", allow_failure = false)
//! #cli! false              -> ("false", allow_failure = true)
//!   #CLI: ls -la           -> ("ls -la", allow_failure = false)
//! ```

use mt_domain::config::DirectivesConfig;
use mt_domain::error::{Error, Result};
use regex::Regex;

/// One extracted directive, in content order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub command: String,
    pub allow_failure: bool,
}

#[derive(Debug, Clone)]
pub struct DirectiveExtractor {
    pattern: Regex,
}

impl DirectiveExtractor {
    /// `marker` is matched case-insensitively. An empty `bang` disables
    /// allow-failure directives.
    pub fn new(marker: &str, bang: &str) -> Result<Self> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(Error::Config("directive marker must not be empty".into()));
        }
        let bang = if bang.is_empty() {
            "(?P<bang>)".to_owned()
        } else {
            format!("(?P<bang>{})?", regex::escape(bang))
        };
        // The separator must stay on the marker's line.
        let pattern = format!(
            r"(?mi)^[ \t]*{}{}[: \t]+(?P<cmd>.+?)[ \t\r]*$",
            regex::escape(marker),
            bang
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("invalid directive pattern: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn from_config(cfg: &DirectivesConfig) -> Result<Self> {
        Self::new(&cfg.marker, &cfg.bang)
    }

    pub fn extract(&self, content: &str) -> Vec<Directive> {
        let directives: Vec<Directive> = self
            .pattern
            .captures_iter(content)
            .filter_map(|caps| {
                let command = caps.name("cmd")?.as_str().trim();
                if command.is_empty() {
                    return None;
                }
                Some(Directive {
                    command: command.to_owned(),
                    allow_failure: caps.name("bang").is_some_and(|b| !b.as_str().is_empty()),
                })
            })
            .collect();

        if !directives.is_empty() {
            tracing::debug!(count = directives.len(), "directives found in content");
        }
        directives
    }
}
