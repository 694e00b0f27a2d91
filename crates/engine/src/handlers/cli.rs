use async_trait::async_trait;
use mt_domain::error::Result;
use mt_sandbox::{CommandPolicy, CommandResult, DirectiveExtractor, SandboxExecutor};
use serde::Serialize;

use crate::registry::{EventHandler, MemoEvent};
use crate::reporter::{PostOutcome, ResultReporter};

/// Extract `#cli` directives, run the safe ones, post the output back.
pub struct CliRunner {
    extractor: DirectiveExtractor,
    policy: CommandPolicy,
    executor: SandboxExecutor,
    reporter: ResultReporter,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOutcome {
    pub results: Vec<CommandResult>,
    pub posted: Vec<PostOutcome>,
}

impl CliRunner {
    pub fn new(
        extractor: DirectiveExtractor,
        policy: CommandPolicy,
        executor: SandboxExecutor,
        reporter: ResultReporter,
    ) -> Self {
        Self {
            extractor,
            policy,
            executor,
            reporter,
        }
    }

    pub async fn run(&self, parent: Option<&str>, content: &str) -> CliOutcome {
        let directives = self.extractor.extract(content);
        let commands = self.policy.admit(&directives);
        if commands.is_empty() {
            tracing::debug!(found = directives.len(), "no runnable directives");
            return CliOutcome::default();
        }

        let results = self.executor.run_to_end(commands).await;
        let posted = self.reporter.report(parent, &results).await;
        CliOutcome { results, posted }
    }
}

#[async_trait]
impl EventHandler for CliRunner {
    fn name(&self) -> &str {
        "run_cli"
    }

    async fn handle(&self, event: &MemoEvent) -> Result<()> {
        let outcome = self.run(event.note.name.as_deref(), &event.note.content).await;
        let failed = outcome.results.iter().filter(|r| !r.succeeded()).count();
        tracing::info!(
            note = ?event.note.name,
            executed = outcome.results.len(),
            failed,
            posted = outcome.posted.iter().filter(|p| p.is_posted()).count(),
            "cli directives processed"
        );
        Ok(())
    }
}
