use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Log output and optional OTLP trace export for `memotic serve`.
///
/// Every webhook runs inside a `webhook` span carrying its `request_id`,
/// and each handler invocation inside a child `handler` span carrying
/// `event_type` and `handler`. With `otlp_endpoint` set those spans are
/// exported; otherwise they only decorate the log lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Server log line format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "d_log_filter")]
    pub log_filter: String,

    /// OTLP gRPC endpoint (e.g. `http://localhost:4317`).
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// `service.name` resource attribute.
    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// `deployment.environment` resource attribute, if any.
    #[serde(default)]
    pub environment: Option<String>,

    /// Fraction of webhook traces exported (`0.0..=1.0`).
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Compact,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: d_log_filter(),
            otlp_endpoint: None,
            service_name: d_service_name(),
            environment: None,
            sample_rate: d_sample_rate(),
        }
    }
}

impl ObservabilityConfig {
    pub fn exports_traces(&self) -> bool {
        self.otlp_endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

fn d_log_filter() -> String {
    "info,mt_gateway=debug".into()
}

fn d_service_name() -> String {
    "memotic".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.log_filter, "info,mt_gateway=debug");
        assert_eq!(cfg.service_name, "memotic");
        assert!(!cfg.exports_traces());
    }

    #[test]
    fn export_settings() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            log_format = "compact"
            otlp_endpoint = "http://otel:4317"
            environment = "staging"
            sample_rate = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_format, LogFormat::Compact);
        assert!(cfg.exports_traces());
        assert_eq!(cfg.environment.as_deref(), Some("staging"));
        assert!((cfg.sample_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn blank_endpoint_disables_export() {
        let cfg = ObservabilityConfig {
            otlp_endpoint: Some("  ".into()),
            ..ObservabilityConfig::default()
        };
        assert!(!cfg.exports_traces());
    }
}
