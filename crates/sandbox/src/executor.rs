//! Sequential command execution against one container session.
//!
//! ```text
//! Idle ──▶ Preparing ──▶ Running ──▶ Halted ────┐
//!              │            │                   ├──▶ Done
//!              │            └──────▶ Completed ─┘
//!              └──────────────────────────────────▶ Done   (setup failed)
//! ```
//!
//! At most one command is in flight. A command that fails without
//! allow-failure halts the run; nothing after it is executed.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use mt_domain::trace::TraceEvent;
use serde::Serialize;

use crate::commands::CommandSpec;
use crate::container::{ContainerManager, TIMEOUT_EXIT_CODE};

/// A boxed async stream of execution results.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Extra time granted to the container manager beyond the command timeout
/// before the executor gives up on it.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the command never produced a timing (setup or
    /// execution-layer failure).
    pub duration_secs: Option<f64>,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    fn failure(command: &str, stderr: String) -> Self {
        Self {
            command: command.to_owned(),
            exit_code: -1,
            stdout: String::new(),
            stderr,
            duration_secs: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Preparing,
    Running,
    Halted,
    Completed,
    Done,
}

impl ExecutorState {
    /// State after a command finished while `Running`.
    pub fn after_command(self, failed: bool, allow_failure: bool, was_last: bool) -> Self {
        match self {
            Self::Running if failed && !allow_failure => Self::Halted,
            Self::Running if was_last => Self::Completed,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

fn enter(state: &mut ExecutorState, next: ExecutorState) {
    tracing::trace!(from = ?*state, to = ?next, "executor transition");
    *state = next;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct SandboxExecutor {
    containers: Arc<dyn ContainerManager>,
    timeout: Duration,
}

impl SandboxExecutor {
    pub fn new(containers: Arc<dyn ContainerManager>, timeout: Duration) -> Self {
        Self { containers, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `commands` in order, yielding one result per executed command.
    ///
    /// An empty list yields nothing and never touches the container. If the
    /// container cannot be prepared, a single synthetic result for the first
    /// command is yielded (exit code -1).
    pub fn run(&self, commands: Vec<CommandSpec>) -> BoxStream<'static, CommandResult> {
        let containers = self.containers.clone();
        let timeout = self.timeout;

        Box::pin(async_stream::stream! {
            let mut state = ExecutorState::Idle;
            if commands.is_empty() {
                enter(&mut state, ExecutorState::Done);
                return;
            }

            enter(&mut state, ExecutorState::Preparing);
            let container = match containers.ensure_container().await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(error = %e, "failed to prepare sandbox container");
                    yield CommandResult::failure(
                        &commands[0].raw_command,
                        format!("Container setup failed: {e}"),
                    );
                    enter(&mut state, ExecutorState::Done);
                    return;
                }
            };

            enter(&mut state, ExecutorState::Running);
            tracing::info!(container = %container, count = commands.len(), "executing commands");
            let total = commands.len();

            for (i, spec) in commands.iter().enumerate() {
                let result = execute_one(containers.as_ref(), &container, spec, timeout).await;

                TraceEvent::CommandExecuted {
                    command: spec.raw_command.clone(),
                    exit_code: result.exit_code,
                    duration_ms: result.duration_secs.map(|s| (s * 1000.0) as u64),
                    allow_failure: spec.allow_failure,
                }
                .emit();

                let failed = !result.succeeded();
                yield result;

                let next = state.after_command(failed, spec.allow_failure, i + 1 == total);
                enter(&mut state, next);
                if state == ExecutorState::Halted {
                    tracing::warn!(
                        command = %spec.raw_command,
                        skipped = total - i - 1,
                        "stopping after command failure"
                    );
                    break;
                }
            }

            enter(&mut state, ExecutorState::Done);
        })
    }

    /// Drive [`run`](Self::run) to completion.
    pub async fn run_to_end(&self, commands: Vec<CommandSpec>) -> Vec<CommandResult> {
        self.run(commands).collect().await
    }
}

async fn execute_one(
    containers: &dyn ContainerManager,
    container: &str,
    spec: &CommandSpec,
    timeout: Duration,
) -> CommandResult {
    tracing::debug!(command = %spec.raw_command, allow_failure = spec.allow_failure, "executing");
    let exec = containers.execute_shell(container, &spec.raw_command, timeout);

    match tokio::time::timeout(timeout + TIMEOUT_GRACE, exec).await {
        Ok(Ok(out)) => CommandResult {
            command: spec.raw_command.clone(),
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            duration_secs: Some(out.duration_secs),
        },
        Ok(Err(e)) => {
            tracing::error!(command = %spec.raw_command, error = %e, "command execution failed");
            CommandResult::failure(&spec.raw_command, e.to_string())
        }
        Err(_) => CommandResult {
            command: spec.raw_command.clone(),
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("command timed out after {}s", timeout.as_secs()),
            duration_secs: Some((timeout + TIMEOUT_GRACE).as_secs_f64()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_failure_halts() {
        let s = ExecutorState::Running.after_command(true, false, false);
        assert_eq!(s, ExecutorState::Halted);
    }

    #[test]
    fn allowed_failure_continues() {
        let s = ExecutorState::Running.after_command(true, true, false);
        assert_eq!(s, ExecutorState::Running);
        let s = ExecutorState::Running.after_command(true, true, true);
        assert_eq!(s, ExecutorState::Completed);
    }

    #[test]
    fn last_success_completes() {
        assert_eq!(
            ExecutorState::Running.after_command(false, false, true),
            ExecutorState::Completed
        );
        assert!(!ExecutorState::Completed.is_terminal());
        assert!(ExecutorState::Done.is_terminal());
    }
}
