//! Container lifecycle behind the [`ContainerManager`] trait.
//!
//! [`DockerContainerManager`] drives the `docker` CLI: either a compose
//! service (when `sandbox.compose_file` is set) or a plain long-lived
//! `docker run` of `sandbox.image`.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mt_domain::config::SandboxConfig;
use mt_domain::error::{Error, Result};
use mt_domain::trace::TraceEvent;
use serde::Serialize;
use tokio::process::Command;

/// Exit code reported when a command exceeds its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Raw outcome of one shell invocation inside the container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub name: String,
    pub exists: bool,
    pub running: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Make sure a ready container exists and return its id or name.
    async fn ensure_container(&self) -> Result<String>;

    /// Run `command` through the configured shell. A command that exceeds
    /// `timeout` yields exit code [`TIMEOUT_EXIT_CODE`]; `Err` is reserved
    /// for failures of the execution layer itself.
    async fn execute_shell(&self, container: &str, command: &str, timeout: Duration) -> Result<ShellOutput>;

    async fn status(&self) -> ContainerStatus;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Docker CLI implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const DOCKER_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const COMPOSE_UP_TIMEOUT: Duration = Duration::from_secs(120);
const READY_POLL: Duration = Duration::from_millis(500);

pub struct DockerContainerManager {
    docker: String,
    name: String,
    image: String,
    workdir: String,
    shell: String,
    compose_file: Option<PathBuf>,
    compose_service: String,
    ready_timeout: Duration,
    /// Serializes container bring-up across concurrent dispatches.
    bring_up: tokio::sync::Mutex<()>,
}

impl DockerContainerManager {
    pub fn new(cfg: &SandboxConfig) -> Self {
        Self {
            docker: cfg.docker_bin.clone(),
            name: cfg.default_container_name(),
            image: cfg.image.clone(),
            workdir: cfg.workdir.clone(),
            shell: cfg.shell.clone(),
            compose_file: cfg.compose_file.clone(),
            compose_service: cfg.compose_service.clone(),
            ready_timeout: Duration::from_secs(cfg.ready_timeout_sec),
            bring_up: tokio::sync::Mutex::new(()),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.name
    }

    // ── docker helpers ───────────────────────────────────────────────

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        let mut cmd = Command::new(&self.docker);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::Container(format!("{} not found in PATH", self.docker)))
            }
            Ok(Err(e)) => Err(Error::Container(format!("{} {}: {e}", self.docker, args.join(" ")))),
            Err(_) => Err(Error::Container(format!(
                "{} {} timed out after {}s",
                self.docker,
                args.join(" "),
                timeout.as_secs()
            ))),
        }
    }

    /// Like [`run`](Self::run) but a non-zero exit is an error.
    async fn run_checked(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(Error::Container(format!(
                "{} {} failed: {}",
                self.docker,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn docker_available(&self) -> bool {
        self.run(&["version", "--format", "{{.Server.Version}}"], DOCKER_CALL_TIMEOUT)
            .await
            .is_ok_and(|o| o.status.success())
    }

    async fn inspect(&self, name: &str, format: &str) -> Option<String> {
        let output = self
            .run(&["inspect", "-f", format, name], DOCKER_CALL_TIMEOUT)
            .await
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    async fn exists(&self, name: &str) -> bool {
        self.inspect(name, "{{.Id}}").await.is_some()
    }

    async fn running(&self, name: &str) -> bool {
        self.inspect(name, "{{.State.Running}}").await.as_deref() == Some("true")
    }

    /// `healthy` | `unhealthy` | `starting` | `none`.
    async fn health(&self, name: &str) -> Option<String> {
        self.inspect(
            name,
            "{{if .State.Health}}{{.State.Health.Status}}{{else}}none{{end}}",
        )
        .await
    }

    async fn probe(&self, name: &str) -> bool {
        self.run(
            &["exec", name, &self.shell, "-lc", "echo health_check"],
            DOCKER_CALL_TIMEOUT,
        )
        .await
        .is_ok_and(|o| o.status.success())
    }

    async fn is_ready(&self, name: &str) -> bool {
        self.running(name).await
            && matches!(self.health(name).await.as_deref(), Some("healthy") | Some("none"))
            && self.probe(name).await
    }

    async fn wait_ready(&self, name: &str) -> bool {
        let deadline = Instant::now() + self.ready_timeout;
        while Instant::now() < deadline {
            if self.is_ready(name).await {
                return true;
            }
            tokio::time::sleep(READY_POLL).await;
        }
        false
    }

    // ── bring-up ─────────────────────────────────────────────────────

    async fn compose_up(&self, file: &std::path::Path) -> Result<String> {
        let file = file.to_string_lossy();
        // A same-named container from an earlier run blocks compose.
        let _ = self.run(&["rm", "-f", &self.name], DOCKER_CALL_TIMEOUT).await;

        tracing::info!(service = %self.compose_service, file = %file, "starting compose service");
        self.run_checked(
            &[
                "compose",
                "-f",
                &file,
                "up",
                "-d",
                "--build",
                "--remove-orphans",
                &self.compose_service,
            ],
            COMPOSE_UP_TIMEOUT,
        )
        .await?;

        let ps = self
            .run(&["compose", "-f", &file, "ps", "-q", &self.compose_service], DOCKER_CALL_TIMEOUT)
            .await?;
        let id = String::from_utf8_lossy(&ps.stdout).trim().to_owned();
        if id.is_empty() {
            return Ok(self.name.clone());
        }
        Ok(self
            .inspect(&id, "{{.Name}}")
            .await
            .map(|n| n.trim_start_matches('/').to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.name.clone()))
    }

    async fn run_standalone(&self) -> Result<String> {
        if self.exists(&self.name).await {
            tracing::info!(container = %self.name, "starting existing container");
            self.run_checked(&["start", &self.name], DOCKER_CALL_TIMEOUT).await?;
        } else {
            tracing::info!(container = %self.name, image = %self.image, "creating container");
            self.run_checked(
                &[
                    "run", "-d", "--name", &self.name, "-w", &self.workdir, &self.image, "sleep",
                    "infinity",
                ],
                COMPOSE_UP_TIMEOUT,
            )
            .await?;
        }
        Ok(self.name.clone())
    }
}

#[async_trait]
impl ContainerManager for DockerContainerManager {
    async fn ensure_container(&self) -> Result<String> {
        let _guard = self.bring_up.lock().await;
        let start = Instant::now();

        if !self.docker_available().await {
            return Err(Error::Container("Docker daemon not available".into()));
        }

        if self.is_ready(&self.name).await {
            return Ok(self.name.clone());
        }

        let name = match &self.compose_file {
            Some(file) => self.compose_up(file).await?,
            None => self.run_standalone().await?,
        };

        if !self.wait_ready(&name).await {
            return Err(Error::Container(format!(
                "container {name} not ready after {}s",
                self.ready_timeout.as_secs()
            )));
        }

        TraceEvent::ContainerReady {
            container: name.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(name)
    }

    async fn execute_shell(&self, container: &str, command: &str, timeout: Duration) -> Result<ShellOutput> {
        let start = Instant::now();
        let mut cmd = Command::new(&self.docker);
        cmd.args(["exec", "-w", self.workdir.as_str(), container, self.shell.as_str(), "-lc", command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Container(format!("failed to spawn {}: {e}", self.docker)))?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ShellOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration_secs: start.elapsed().as_secs_f64(),
            }),
            Ok(Err(e)) => Err(Error::Container(format!("exec failed: {e}"))),
            Err(_) => Ok(ShellOutput {
                exit_code: TIMEOUT_EXIT_CODE,
                stdout: String::new(),
                stderr: format!("command timed out after {}s", timeout.as_secs()),
                duration_secs: start.elapsed().as_secs_f64(),
            }),
        }
    }

    async fn status(&self) -> ContainerStatus {
        let mut status = ContainerStatus {
            name: self.name.clone(),
            ..ContainerStatus::default()
        };
        if !self.docker_available().await {
            status.error = Some("Docker daemon not available".into());
            return status;
        }
        status.exists = self.exists(&self.name).await;
        status.running = status.exists && self.running(&self.name).await;
        if status.running {
            status.healthy = matches!(
                self.health(&self.name).await.as_deref(),
                Some("healthy") | Some("none")
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_docker_binary_is_a_container_error() {
        let cfg = SandboxConfig {
            docker_bin: "/nonexistent/docker-binary".into(),
            ..SandboxConfig::default()
        };
        let mgr = DockerContainerManager::new(&cfg);
        let err = mgr.ensure_container().await.unwrap_err();
        assert!(matches!(err, Error::Container(_)), "{err:?}");

        let status = mgr.status().await;
        assert_eq!(status.name, "memotic-cli");
        assert!(!status.exists);
        assert!(status.error.is_some());

        let err = mgr
            .execute_shell("memotic-cli", "echo hi", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Container(_)));
    }
}
