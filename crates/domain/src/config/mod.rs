mod directives;
mod events;
mod handlers;
mod notes_api;
mod observability;
mod sandbox;
mod server;

pub use directives::*;
pub use events::*;
pub use handlers::*;
pub use notes_api::*;
pub use observability::*;
pub use sandbox::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notes_api: NotesApiConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub directives: DirectivesConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply `MEMOTIC_*` / `MEMOS_*` environment overrides on top of the
    /// file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable lookup. Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(v) = get("MEMOTIC_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("MEMOTIC_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = get("MEMOS_HOST") {
            self.notes_api.host = v;
        }
        if let Some(v) = get("MEMOS_PORT").and_then(|v| v.parse().ok()) {
            self.notes_api.port = v;
        }
        if let Some(v) = get("MEMOS_URL") {
            self.notes_api.base_url = Some(v);
        }
        if let Some(v) = get("MEMOTIC_CLI_CONTAINER") {
            self.sandbox.container_name = Some(v);
        }
        if let Some(v) = get("MEMOTIC_CLI_IMAGE") {
            self.sandbox.image = v;
        }
        if let Some(v) = get("MEMOTIC_CLI_WORKDIR") {
            self.sandbox.workdir = v;
        }
        if let Some(v) = get("MEMOTIC_CLI_SHELL") {
            self.sandbox.shell = v;
        }
        if let Some(v) = get("MEMOTIC_CLI_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.sandbox.timeout_sec = v;
        }
        if let Some(v) = get("MEMOTIC_CLI_COMPOSE_FILE") {
            self.sandbox.compose_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MEMOTIC_COMPOSE_SERVICE") {
            self.sandbox.compose_service = v;
        }
        if let Some(v) = get("MEMOTIC_CLI_COMMENT_MAX").and_then(|v| v.parse().ok()) {
            self.directives.max_comment_chars = v;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        let url = self.notes_api.url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::error(
                "notes_api.base_url",
                format!("\"{url}\" is not an http(s) URL"),
            ));
        }

        if self.sandbox.timeout_sec == 0 {
            errors.push(ConfigError::error("sandbox.timeout_sec", "timeout must be greater than 0"));
        }
        if self.sandbox.shell.is_empty() {
            errors.push(ConfigError::error("sandbox.shell", "shell must not be empty"));
        }
        for (i, pattern) in self.sandbox.denied_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError::error(
                    format!("sandbox.denied_patterns[{i}]"),
                    format!("invalid regex: {e}"),
                ));
            }
        }
        if self.sandbox.denied_patterns.is_empty() {
            errors.push(ConfigError::warning(
                "sandbox.denied_patterns",
                "no denied patterns; every extracted command reaches the container",
            ));
        }

        if self.directives.marker.trim().is_empty() {
            errors.push(ConfigError::error("directives.marker", "marker must not be empty"));
        }
        if self.directives.max_comment_chars == 0 {
            errors.push(ConfigError::error(
                "directives.max_comment_chars",
                "max_comment_chars must be greater than 0",
            ));
        }

        if self.dispatch.handler_timeout_sec == 0 {
            errors.push(ConfigError::error(
                "dispatch.handler_timeout_sec",
                "handler timeout must be greater than 0",
            ));
        }

        if self.handlers.notify.channels.contains(&NotifyChannel::Webhook)
            && self.handlers.notify.webhook_url.is_none()
        {
            errors.push(ConfigError::warning(
                "handlers.notify.webhook_url",
                "webhook channel enabled without a webhook_url",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }
        if self.observability.log_filter.trim().is_empty() {
            errors.push(ConfigError::error(
                "observability.log_filter",
                "log_filter must not be empty",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        if self.events.builtin_cli {
            seen.insert("CliTagged".to_owned());
        }
        for (i, rule) in self.events.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                errors.push(ConfigError::error(
                    format!("events.rules[{i}].name"),
                    "rule name must not be empty",
                ));
            } else if !seen.insert(rule.name.clone()) {
                errors.push(ConfigError::error(
                    format!("events.rules[{i}].name"),
                    format!("duplicate event type \"{}\"", rule.name),
                ));
            }
            if let Some(pattern) = &rule.content_pattern {
                if let Err(e) = regex::Regex::new(pattern) {
                    errors.push(ConfigError::error(
                        format!("events.rules[{i}].content_pattern"),
                        format!("invalid regex: {e}"),
                    ));
                }
            }
            if rule.handlers.is_empty() {
                errors.push(ConfigError::warning(
                    format!("events.rules[{i}].handlers"),
                    "rule has no handlers; it is abstract and never matches",
                ));
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
