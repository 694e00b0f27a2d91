//! Command parsing and safety classification.
//!
//! Every directive is tokenized into a [`CommandSpec`] and handed to the
//! first [`Recognizer`] in the chain whose `matches` accepts it. The
//! [`DenyList`] is consulted for every command regardless of which
//! recognizer handled it, so `echo hi; sudo reboot` is still refused.

use std::collections::BTreeMap;
use std::sync::Arc;

use mt_domain::config::SandboxConfig;
use mt_domain::error::{Error, Result};
use mt_domain::trace::TraceEvent;
use regex::Regex;

use crate::directives::Directive;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CommandSpec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Switch,
    Value(String),
}

/// One command as written, plus a best-effort tokenization used only for
/// classification. The raw string is what gets executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub raw_command: String,
    pub allow_failure: bool,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub flags: BTreeMap<String, FlagValue>,
}

impl CommandSpec {
    pub fn parse(raw_command: &str, allow_failure: bool) -> Self {
        let raw_command = raw_command.trim().to_owned();
        let (parts, parsed) = match shell_words::split(&raw_command) {
            Ok(parts) => (parts, true),
            // Unbalanced quotes and the like.
            Err(_) => (
                raw_command.split_whitespace().map(str::to_owned).collect(),
                false,
            ),
        };

        let mut parts = parts.into_iter();
        let program = parts.next();
        let args: Vec<String> = parts.collect();
        let flags = if parsed { parse_flags(&args) } else { BTreeMap::new() };

        Self {
            raw_command,
            allow_failure,
            program,
            args,
            flags,
        }
    }

    pub fn from_directive(directive: &Directive) -> Self {
        Self::parse(&directive.command, directive.allow_failure)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }
}

/// `--key=value`, `--key value`, `--switch`, and bundled short flags
/// (`-abc` sets `a`, `b`, `c`).
fn parse_flags(args: &[String]) -> BTreeMap<String, FlagValue> {
    let mut flags = BTreeMap::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if let Some(long) = arg.strip_prefix("--") {
            if let Some((key, value)) = long.split_once('=') {
                flags.insert(key.to_owned(), FlagValue::Value(value.to_owned()));
            } else if let Some(next) = args.get(i + 1).filter(|n| !n.starts_with('-')) {
                flags.insert(long.to_owned(), FlagValue::Value(next.clone()));
                i += 1;
            } else {
                flags.insert(long.to_owned(), FlagValue::Switch);
            }
        } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            for c in short.chars() {
                flags.insert(c.to_string(), FlagValue::Switch);
            }
        }
        i += 1;
    }
    flags
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deny list
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dangerous shell patterns, searched in the lower-cased command.
#[derive(Debug, Clone)]
pub struct DenyList {
    patterns: Arc<[Regex]>,
}

impl DenyList {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| Error::Config(format!("invalid denied pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns: compiled.into(),
        })
    }

    /// The first pattern that matches `command`, if any.
    pub fn find(&self, command: &str) -> Option<&str> {
        let lower = command.to_lowercase();
        self.patterns
            .iter()
            .find(|re| re.is_match(&lower))
            .map(Regex::as_str)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Recognizers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A typed view over one family of commands.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this recognizer handles `command`.
    fn matches(&self, command: &str) -> bool;

    /// Non-fatal problems worth a warning.
    fn validate(&self, spec: &CommandSpec) -> Vec<String>;

    fn is_safe(&self, spec: &CommandSpec) -> bool;
}

fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

pub struct EchoRecognizer;

impl Recognizer for EchoRecognizer {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn matches(&self, command: &str) -> bool {
        first_word(command) == "echo"
    }

    fn validate(&self, spec: &CommandSpec) -> Vec<String> {
        if spec.args.is_empty() {
            vec!["echo command has no message".into()]
        } else {
            Vec::new()
        }
    }

    fn is_safe(&self, _spec: &CommandSpec) -> bool {
        true
    }
}

pub struct GitRecognizer;

impl GitRecognizer {
    fn subcommand(spec: &CommandSpec) -> Option<&str> {
        spec.args.first().map(String::as_str)
    }
}

impl Recognizer for GitRecognizer {
    fn name(&self) -> &'static str {
        "git"
    }

    fn matches(&self, command: &str) -> bool {
        first_word(command) == "git"
    }

    fn validate(&self, spec: &CommandSpec) -> Vec<String> {
        if Self::subcommand(spec).is_none() {
            vec!["git command missing subcommand".into()]
        } else {
            Vec::new()
        }
    }

    fn is_safe(&self, spec: &CommandSpec) -> bool {
        match Self::subcommand(spec) {
            Some("rm") | Some("clean") => return false,
            Some("reset") if spec.has_flag("hard") => return false,
            _ => {}
        }
        !(spec.has_flag("force") || spec.has_flag("f"))
    }
}

/// Catch-all; always last in the chain.
pub struct GenericRecognizer {
    deny: DenyList,
}

impl GenericRecognizer {
    pub fn new(deny: DenyList) -> Self {
        Self { deny }
    }
}

impl Recognizer for GenericRecognizer {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn matches(&self, _command: &str) -> bool {
        true
    }

    fn validate(&self, spec: &CommandSpec) -> Vec<String> {
        if spec.raw_command.trim().is_empty() {
            vec!["empty command".into()]
        } else {
            Vec::new()
        }
    }

    fn is_safe(&self, spec: &CommandSpec) -> bool {
        self.deny.find(&spec.raw_command).is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classification outcome for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub recognizer: &'static str,
    pub safe: bool,
    pub denied_by: Option<String>,
    pub warnings: Vec<String>,
}

/// Recognizer chain plus the global deny list.
pub struct CommandPolicy {
    recognizers: Vec<Box<dyn Recognizer>>,
    fallback: GenericRecognizer,
    deny: DenyList,
}

impl CommandPolicy {
    /// Echo and git recognizers, generic fallback.
    pub fn new(denied_patterns: &[String]) -> Result<Self> {
        let deny = DenyList::new(denied_patterns)?;
        Ok(Self {
            recognizers: vec![Box::new(EchoRecognizer), Box::new(GitRecognizer)],
            fallback: GenericRecognizer::new(deny.clone()),
            deny,
        })
    }

    pub fn from_config(cfg: &SandboxConfig) -> Result<Self> {
        Self::new(&cfg.denied_patterns)
    }

    /// Add a recognizer ahead of the generic fallback.
    pub fn with_recognizer(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    fn recognizer_for(&self, command: &str) -> &dyn Recognizer {
        self.recognizers
            .iter()
            .map(|r| &**r)
            .find(|r| r.matches(command))
            .unwrap_or(&self.fallback)
    }

    pub fn classify(&self, spec: &CommandSpec) -> Verdict {
        let recognizer = self.recognizer_for(&spec.raw_command);
        let denied_by = self.deny.find(&spec.raw_command).map(str::to_owned);
        Verdict {
            recognizer: recognizer.name(),
            safe: denied_by.is_none() && recognizer.is_safe(spec),
            denied_by,
            warnings: recognizer.validate(spec),
        }
    }

    /// Parse and classify directives, keeping only the safe ones (in order).
    /// Unsafe commands are logged and never returned.
    pub fn admit(&self, directives: &[Directive]) -> Vec<CommandSpec> {
        let mut admitted = Vec::with_capacity(directives.len());
        for directive in directives {
            let spec = CommandSpec::from_directive(directive);
            let verdict = self.classify(&spec);

            if !verdict.warnings.is_empty() {
                tracing::warn!(
                    command = %spec.raw_command,
                    recognizer = verdict.recognizer,
                    warnings = ?verdict.warnings,
                    "command validation warnings"
                );
            }

            if verdict.safe {
                admitted.push(spec);
            } else {
                tracing::warn!(
                    command = %spec.raw_command,
                    recognizer = verdict.recognizer,
                    pattern = ?verdict.denied_by,
                    "blocked unsafe command"
                );
                TraceEvent::CommandBlocked {
                    command: spec.raw_command.clone(),
                    recognizer: verdict.recognizer.to_owned(),
                }
                .emit();
            }
        }
        admitted
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CommandPolicy {
        CommandPolicy::from_config(&SandboxConfig::default()).unwrap()
    }

    fn directive(command: &str) -> Directive {
        Directive {
            command: command.into(),
            allow_failure: false,
        }
    }

    #[test]
    fn flags_are_parsed() {
        let spec = CommandSpec::parse("tool --out=file.txt --level 3 --dry -xv arg", false);
        assert_eq!(spec.program.as_deref(), Some("tool"));
        assert_eq!(spec.flags.get("out"), Some(&FlagValue::Value("file.txt".into())));
        assert_eq!(spec.flags.get("level"), Some(&FlagValue::Value("3".into())));
        assert_eq!(spec.flags.get("dry"), Some(&FlagValue::Switch));
        assert!(spec.has_flag("x") && spec.has_flag("v"));
    }

    #[test]
    fn unbalanced_quotes_fall_back_to_whitespace_split() {
        let spec = CommandSpec::parse("echo \"unterminated -rf", false);
        assert_eq!(spec.args, vec!["\"unterminated".to_string(), "-rf".to_string()]);
        assert!(spec.flags.is_empty());
    }

    #[test]
    fn recognizer_chain_picks_first_match() {
        let p = policy();
        assert_eq!(p.classify(&CommandSpec::parse("echo hi", false)).recognizer, "echo");
        assert_eq!(p.classify(&CommandSpec::parse("git status", false)).recognizer, "git");
        assert_eq!(p.classify(&CommandSpec::parse("echoes", false)).recognizer, "generic");
        assert_eq!(p.classify(&CommandSpec::parse("ls -la", false)).recognizer, "generic");
    }

    #[test]
    fn dangerous_commands_are_dropped() {
        let p = policy();
        let directives = [
            directive("rm -rf /"),
            directive("echo ok"),
            directive("sudo apt-get install x"),
            directive("chmod 777 /etc"),
            directive(":(){ :|:& };:"),
            directive("dd if=/dev/zero of=/dev/sda"),
            directive("echo fine; RM -RF /"),
            directive("ls"),
        ];
        let admitted: Vec<String> = p.admit(&directives).into_iter().map(|s| s.raw_command).collect();
        assert_eq!(admitted, vec!["echo ok".to_string(), "ls".to_string()]);
    }

    #[test]
    fn destructive_git_is_blocked() {
        let p = policy();
        for cmd in ["git rm file", "git clean -fd", "git reset --hard HEAD~1", "git push --force", "git push -f"] {
            assert!(!p.classify(&CommandSpec::parse(cmd, false)).safe, "{cmd} should be unsafe");
        }
        for cmd in ["git status", "git log --oneline", "git reset HEAD file"] {
            assert!(p.classify(&CommandSpec::parse(cmd, false)).safe, "{cmd} should be safe");
        }
    }

    #[test]
    fn warnings_do_not_block() {
        let p = policy();
        let verdict = p.classify(&CommandSpec::parse("echo", false));
        assert!(verdict.safe);
        assert_eq!(verdict.warnings.len(), 1);
    }

    #[test]
    fn invalid_denied_pattern_is_a_config_error() {
        assert!(matches!(
            CommandPolicy::new(&["(".to_string()]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn allow_failure_survives_admission() {
        let p = policy();
        let admitted = p.admit(&[Directive {
            command: "false".into(),
            allow_failure: true,
        }]);
        assert!(admitted[0].allow_failure);
    }
}
