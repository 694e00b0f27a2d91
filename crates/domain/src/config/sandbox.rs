use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox container
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where and how embedded commands are executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Container name override. Defaults to `memotic-cli`.
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default = "d_image")]
    pub image: String,
    #[serde(default = "d_workdir")]
    pub workdir: String,
    #[serde(default = "d_shell")]
    pub shell: String,
    /// Per-command timeout (seconds).
    #[serde(default = "d_30")]
    pub timeout_sec: u64,
    /// When set, the container is brought up with `docker compose -f <file>`;
    /// otherwise a plain `docker run` of `image` is used.
    #[serde(default)]
    pub compose_file: Option<PathBuf>,
    #[serde(default = "d_service")]
    pub compose_service: String,
    /// How long to wait for the container to become ready (seconds).
    #[serde(default = "d_45")]
    pub ready_timeout_sec: u64,
    #[serde(default = "d_docker")]
    pub docker_bin: String,
    /// Regex patterns (matched against the lower-cased command). Commands
    /// matching any pattern never reach the container.
    #[serde(default = "d_denied_patterns")]
    pub denied_patterns: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            container_name: None,
            image: d_image(),
            workdir: d_workdir(),
            shell: d_shell(),
            timeout_sec: 30,
            compose_file: None,
            compose_service: d_service(),
            ready_timeout_sec: 45,
            docker_bin: d_docker(),
            denied_patterns: d_denied_patterns(),
        }
    }
}

impl SandboxConfig {
    pub fn default_container_name(&self) -> String {
        self.container_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "memotic-cli".into())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_image() -> String {
    "debian:bookworm-slim".into()
}
fn d_workdir() -> String {
    "/workspace".into()
}
fn d_shell() -> String {
    "/bin/bash".into()
}
fn d_30() -> u64 {
    30
}
fn d_45() -> u64 {
    45
}
fn d_service() -> String {
    "cli".into()
}
fn d_docker() -> String {
    "docker".into()
}
fn d_denied_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s*/".into(),
        r"format\s+[a-z]:".into(),
        r":\(\)\s*\{.*\|.*&".into(),
        r"dd\s+if=/dev/zero".into(),
        r"mkfs\.".into(),
        r"chmod\s+(-r\s+)?777".into(),
        r"\bsudo\s+".into(),
        r"\bsu\s+".into(),
    ]
}
