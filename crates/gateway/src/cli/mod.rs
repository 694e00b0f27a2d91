pub mod config;
pub mod dispatch;
pub mod doctor;
pub mod extract;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// memotic: memo webhook matching and sandboxed `#cli` execution.
#[derive(Debug, Parser)]
#[command(name = "memotic", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the webhook server (default when no subcommand is given).
    Serve,
    /// Dispatch a webhook payload from a file and print the result as JSON.
    Dispatch {
        /// Path to the JSON payload.
        #[arg(long)]
        file: PathBuf,
        /// Extra request header, `name=value` or `name: value`. Repeatable.
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Print the directives found in a note and how each is classified.
    Extract {
        /// Path to a file holding the note content.
        #[arg(long)]
        file: PathBuf,
    },
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `MEMOTIC_CONFIG` (or
/// `config.toml` by default), then apply environment overrides. Returns
/// the parsed [`Config`](mt_domain::config::Config) and the path used.
pub fn load_config() -> anyhow::Result<(mt_domain::config::Config, String)> {
    let config_path = std::env::var("MEMOTIC_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let mut config = load_config_from(&config_path)?;
    config.apply_env_overrides();
    Ok((config, config_path))
}

/// Parse `path` if it exists; a missing file yields the defaults.
pub fn load_config_from(path: &str) -> anyhow::Result<mt_domain::config::Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(mt_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
}
