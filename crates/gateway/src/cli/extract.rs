use std::path::Path;

use anyhow::Context;
use mt_domain::config::Config;
use mt_sandbox::{CommandPolicy, CommandSpec, DirectiveExtractor};

/// Print every directive in the file with its verdict. Nothing is executed.
pub fn run(config: &Config, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let extractor = DirectiveExtractor::from_config(&config.directives)?;
    let policy = CommandPolicy::from_config(&config.sandbox)?;

    let directives = extractor.extract(&content);
    if directives.is_empty() {
        println!("no {} directives found", config.directives.marker);
        return Ok(());
    }

    for (i, directive) in directives.iter().enumerate() {
        let spec = CommandSpec::from_directive(directive);
        let verdict = policy.classify(&spec);
        let status = if verdict.safe { "RUN" } else { "BLOCKED" };
        let bang = if directive.allow_failure { " (allow failure)" } else { "" };
        println!(
            "{:>3}. [{status}] {}{bang}  via {}",
            i + 1,
            directive.command,
            verdict.recognizer
        );
        if let Some(pattern) = verdict.denied_by {
            println!("       denied by /{pattern}/");
        }
        for warning in verdict.warnings {
            println!("       warning: {warning}");
        }
    }
    Ok(())
}
