//! AppState construction shared by `serve`, `dispatch` and `doctor`.
//!
//! Every collaborator is built here once and passed down explicitly; no
//! component looks up configuration or clients on its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use sha2::{Digest, Sha256};

use mt_domain::config::{Config, ConfigSeverity, HandlerAction};
use mt_domain::error::Result;
use mt_engine::handlers::{CliRunner, FileSaveHandler, LogHandler, NotifyHandler, SearchIndex};
use mt_engine::{
    Dispatcher, EventHandler, EventTypeDefinition, PredicateSpec, Registry, RegistryBuilder,
    ResultReporter, Trigger,
};
use mt_notes::NoteApi;
use mt_sandbox::{CommandPolicy, ContainerManager, DirectiveExtractor, DockerContainerManager, SandboxExecutor};

use crate::state::AppState;

/// Name of the built-in `#cli` event type.
pub const BUILTIN_CLI_TYPE: &str = "CliTagged";

/// One shared instance per built-in handler action.
#[derive(Clone)]
pub struct Handlers {
    pub cli: Arc<CliRunner>,
    pub file_save: Arc<FileSaveHandler>,
    pub notify: Arc<NotifyHandler>,
    pub index: Arc<SearchIndex>,
    pub log: Arc<LogHandler>,
}

impl Handlers {
    pub fn build(config: &Config, notes: Arc<dyn NoteApi>, containers: Arc<dyn ContainerManager>) -> Result<Self> {
        let cli = CliRunner::new(
            DirectiveExtractor::from_config(&config.directives)?,
            CommandPolicy::from_config(&config.sandbox)?,
            SandboxExecutor::new(containers, Duration::from_secs(config.sandbox.timeout_sec)),
            ResultReporter::from_config(notes, &config.directives, config.notes_api.comment_visibility),
        );
        Ok(Self {
            cli: Arc::new(cli),
            file_save: Arc::new(FileSaveHandler::new(config.handlers.file_save.clone())),
            notify: Arc::new(NotifyHandler::new(&config.handlers.notify)?),
            index: Arc::new(SearchIndex::from_config(&config.handlers.index)),
            log: Arc::new(LogHandler),
        })
    }

    pub fn for_action(&self, action: HandlerAction) -> Arc<dyn EventHandler> {
        match action {
            HandlerAction::RunCli => self.cli.clone(),
            HandlerAction::SaveFile => self.file_save.clone(),
            HandlerAction::Notify => self.notify.clone(),
            HandlerAction::Index => self.index.clone(),
            HandlerAction::Log => self.log.clone(),
        }
    }
}

/// Register the built-in `#cli` type followed by the configured rules,
/// in file order.
pub fn build_registry(config: &Config, handlers: &Handlers) -> Result<Registry> {
    let mut builder = RegistryBuilder::new();

    if config.events.builtin_cli {
        builder.register(
            EventTypeDefinition::new(
                BUILTIN_CLI_TYPE,
                PredicateSpec::new().any_tags([config.directives.trigger_tag.as_str()]),
            )
            .on(Trigger::OnCreate, handlers.cli.clone()),
        )?;
    }

    for rule in &config.events.rules {
        let predicates = PredicateSpec::from_rule(rule)?;
        let def = if rule.handlers.is_empty() {
            EventTypeDefinition::abstract_template(rule.name.clone(), predicates)
        } else {
            rule.handlers.iter().fold(
                EventTypeDefinition::new(rule.name.clone(), predicates),
                |def, h| def.on(Trigger::parse(&h.on), handlers.for_action(h.action)),
            )
        };
        builder.register(def)?;
    }

    Ok(builder.build())
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Validate config, connect the production collaborators and return a
/// fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Note service client ──────────────────────────────────────────
    let notes = mt_notes::create_client(&config.notes_api).context("creating note API client")?;

    // ── Container manager ────────────────────────────────────────────
    let docker = DockerContainerManager::new(&config.sandbox);
    tracing::info!(
        container = %docker.container_name(),
        image = %config.sandbox.image,
        "container manager ready"
    );

    let api_token_hash = env_secret(&config.server.api_token_env)
        .map(|t| Sha256::digest(t.as_bytes()).to_vec());
    if api_token_hash.is_none() {
        tracing::warn!(
            env = %config.server.api_token_env,
            "API token not set; /v1 endpoints are unauthenticated (dev mode)"
        );
    }

    let webhook_secret = env_secret(&config.server.webhook_secret_env);
    if webhook_secret.is_none() {
        tracing::info!(
            env = %config.server.webhook_secret_env,
            "webhook secret not set; accepting unsigned payloads"
        );
    }

    let mut state = build_app_state_with(config, notes, Arc::new(docker))?;
    state.api_token_hash = api_token_hash;
    state.webhook_secret = webhook_secret;
    Ok(state)
}

/// Wire an [`AppState`] around the given collaborators. Auth is left
/// disabled; [`build_app_state`] fills it in from the environment.
pub fn build_app_state_with(
    config: Arc<Config>,
    notes: Arc<dyn NoteApi>,
    containers: Arc<dyn ContainerManager>,
) -> anyhow::Result<AppState> {
    let handlers = Handlers::build(&config, notes.clone(), containers.clone())
        .context("building event handlers")?;
    let registry = Arc::new(build_registry(&config, &handlers).context("registering event types")?);
    tracing::info!(event_types = ?registry.names(), "event registry ready");

    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        Duration::from_secs(config.dispatch.handler_timeout_sec),
    ));

    Ok(AppState {
        config,
        notes,
        containers,
        registry,
        dispatcher,
        index: handlers.index,
        api_token_hash: None,
        webhook_secret: None,
        started_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_domain::config::{EventRuleConfig, RuleHandlerConfig};
    use mt_sandbox::{ContainerStatus, ShellOutput};

    struct NoContainers;

    #[async_trait::async_trait]
    impl ContainerManager for NoContainers {
        async fn ensure_container(&self) -> Result<String> {
            Err(mt_domain::error::Error::Container("unavailable".into()))
        }

        async fn execute_shell(&self, _c: &str, _cmd: &str, _t: Duration) -> Result<ShellOutput> {
            Err(mt_domain::error::Error::Container("unavailable".into()))
        }

        async fn status(&self) -> ContainerStatus {
            ContainerStatus::default()
        }
    }

    fn rule(name: &str, handlers: Vec<RuleHandlerConfig>) -> EventRuleConfig {
        EventRuleConfig {
            name: name.into(),
            any_tags: vec!["x".into()],
            all_tags: vec![],
            content_contains: None,
            content_pattern: None,
            visibility: None,
            min_word_count: None,
            handlers,
        }
    }

    fn handlers(config: &Config) -> Handlers {
        let notes = mt_notes::create_client(&config.notes_api).unwrap();
        Handlers::build(config, notes, Arc::new(NoContainers)).unwrap()
    }

    #[test]
    fn builtin_first_then_rules_in_order() {
        let mut config = Config::default();
        config.events.rules.push(rule(
            "Saved",
            vec![RuleHandlerConfig {
                on: "update".into(),
                action: HandlerAction::SaveFile,
            }],
        ));
        config.events.rules.push(rule("Template", vec![]));

        let registry = build_registry(&config, &handlers(&config)).unwrap();
        assert_eq!(registry.names(), vec![BUILTIN_CLI_TYPE, "Saved", "Template"]);
        assert!(registry.get("Template").unwrap().is_abstract);

        let saved = registry.get("Saved").unwrap();
        assert_eq!(saved.handlers[0].trigger, Trigger::OnUpdate);
        assert_eq!(saved.handlers[0].handler.name(), "save_file");

        let cli = registry.get(BUILTIN_CLI_TYPE).unwrap();
        assert!(cli.predicates.any_tags.contains("cli"));
        assert_eq!(cli.handlers[0].trigger, Trigger::OnCreate);
    }

    #[test]
    fn builtin_can_be_disabled() {
        let mut config = Config::default();
        config.events.builtin_cli = false;
        let registry = build_registry(&config, &handlers(&config)).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_rule_names_fail_registration() {
        let mut config = Config::default();
        config.events.rules.push(rule(BUILTIN_CLI_TYPE, vec![]));
        assert!(build_registry(&config, &handlers(&config)).is_err());
    }
}
