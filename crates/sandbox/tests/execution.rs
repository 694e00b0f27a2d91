//! Directive → policy → executor, against a scripted container manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use mt_domain::config::SandboxConfig;
use mt_domain::error::{Error, Result};
use mt_sandbox::{
    CommandPolicy, CommandSpec, ContainerManager, ContainerStatus, DirectiveExtractor,
    SandboxExecutor, ShellOutput, TIMEOUT_EXIT_CODE,
};
use parking_lot::Mutex;

#[derive(Default)]
struct FakeContainers {
    fail_setup: bool,
    executed: Mutex<Vec<String>>,
    ensured: Mutex<usize>,
}

#[async_trait]
impl ContainerManager for FakeContainers {
    async fn ensure_container(&self) -> Result<String> {
        *self.ensured.lock() += 1;
        if self.fail_setup {
            return Err(Error::Container("Docker daemon not available".into()));
        }
        Ok("fake-1".into())
    }

    async fn execute_shell(&self, container: &str, command: &str, timeout: Duration) -> Result<ShellOutput> {
        assert_eq!(container, "fake-1");
        self.executed.lock().push(command.to_owned());
        let out = |exit_code: i32, stdout: &str, stderr: &str| ShellOutput {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_secs: 0.01,
        };
        match command {
            "false" => Ok(out(1, "", "")),
            "boom" => Err(Error::Container("exec transport closed".into())),
            "sleep 999" => Ok(out(
                TIMEOUT_EXIT_CODE,
                "",
                &format!("command timed out after {}s", timeout.as_secs()),
            )),
            c if c.starts_with("echo ") => Ok(out(0, &format!("{}\n", &c[5..]), "")),
            _ => Ok(out(127, "", "command not found")),
        }
    }

    async fn status(&self) -> ContainerStatus {
        ContainerStatus::default()
    }
}

fn specs(commands: &[(&str, bool)]) -> Vec<CommandSpec> {
    commands.iter().map(|(c, bang)| CommandSpec::parse(c, *bang)).collect()
}

fn executor(fake: Arc<FakeContainers>) -> SandboxExecutor {
    SandboxExecutor::new(fake, Duration::from_secs(30))
}

#[tokio::test]
async fn stops_at_first_hard_failure() {
    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake.clone())
        .run_to_end(specs(&[("echo first", false), ("false", false), ("echo never", false)]))
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].command, "echo first");
    assert_eq!(results[0].exit_code, 0);
    assert_eq!(results[0].stdout, "first\n");
    assert_eq!(results[1].command, "false");
    assert_ne!(results[1].exit_code, 0);
    assert_eq!(*fake.executed.lock(), vec!["echo first", "false"]);
}

#[tokio::test]
async fn continues_past_allowed_failure() {
    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake.clone())
        .run_to_end(specs(&[("echo first", false), ("false", true), ("echo reached", false)]))
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[1].exit_code, 1);
    assert_eq!(results[2].stdout, "reached\n");
}

#[tokio::test]
async fn setup_failure_yields_single_synthetic_result() {
    let fake = Arc::new(FakeContainers {
        fail_setup: true,
        ..FakeContainers::default()
    });
    let results = executor(fake.clone())
        .run_to_end(specs(&[("echo a", false), ("echo b", false)]))
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].command, "echo a");
    assert_eq!(results[0].exit_code, -1);
    assert!(results[0].stderr.starts_with("Container setup failed:"));
    assert!(results[0].duration_secs.is_none());
    assert!(fake.executed.lock().is_empty());
}

#[tokio::test]
async fn empty_command_list_never_prepares_container() {
    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake.clone()).run_to_end(Vec::new()).await;
    assert!(results.is_empty());
    assert_eq!(*fake.ensured.lock(), 0);
}

#[tokio::test]
async fn execution_layer_error_is_a_failure() {
    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake.clone())
        .run_to_end(specs(&[("boom", false), ("echo after", false)]))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].exit_code, -1);
    assert!(results[0].stderr.contains("exec transport closed"));

    let results = executor(fake)
        .run_to_end(specs(&[("boom", true), ("echo after", false)]))
        .await;
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn timeout_counts_as_failure() {
    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake)
        .run_to_end(specs(&[("sleep 999", false), ("echo never", false)]))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].exit_code, TIMEOUT_EXIT_CODE);
}

#[tokio::test]
async fn results_stream_in_order() {
    let fake = Arc::new(FakeContainers::default());
    let mut stream = executor(fake).run(specs(&[("echo 1", false), ("echo 2", false), ("echo 3", false)]));
    let mut seen = Vec::new();
    while let Some(r) = stream.next().await {
        seen.push(r.stdout.trim().to_owned());
    }
    assert_eq!(seen, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn unsafe_directives_never_reach_the_container() {
    let content = "#cli echo safe\n#cli rm -rf /\n#cli! sudo reboot\n#cli echo also";
    let directives = DirectiveExtractor::new("#cli", "!").unwrap().extract(content);
    assert_eq!(directives.len(), 4);

    let policy = CommandPolicy::from_config(&SandboxConfig::default()).unwrap();
    let admitted = policy.admit(&directives);

    let fake = Arc::new(FakeContainers::default());
    let results = executor(fake.clone()).run_to_end(admitted).await;
    assert_eq!(results.len(), 2);
    assert_eq!(*fake.executed.lock(), vec!["echo safe", "echo also"]);
}
