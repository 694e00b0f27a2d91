use std::time::Duration;

use mt_domain::config::{Config, ConfigSeverity};
use mt_notes::NoteApi;
use mt_sandbox::{ContainerManager, DockerContainerManager};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("memotic doctor");
    println!("==============\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Note service
    check_notes_api(config, &mut all_passed).await;

    // 4. Sandbox container
    check_container(config, &mut all_passed).await;

    // 5. Handler output directories
    check_writable("File save directory", &config.handlers.file_save.base_path, &mut all_passed);
    check_writable("Search index directory", &config.handlers.index.path, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str) {
    let exists = std::path::Path::new(config_path).exists();
    // Running on defaults is allowed; report it without failing.
    print_check(
        "Config file",
        true,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
        return;
    }
    print_check(
        "Config validation",
        error_count == 0,
        format!("{} issue(s) ({error_count} error(s))", issues.len()),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

async fn check_notes_api(config: &Config, all_passed: &mut bool) {
    let url = config.notes_api.url();
    let client = match mt_notes::RestNoteClient::new(&config.notes_api) {
        Ok(c) => c,
        Err(e) => {
            print_check("Note service reachable", false, format!("{url} ({e})"));
            *all_passed = false;
            return;
        }
    };

    let reachable = matches!(
        tokio::time::timeout(Duration::from_secs(5), client.health()).await,
        Ok(Ok(true))
    );
    print_check(
        "Note service reachable",
        reachable,
        if reachable {
            url.clone()
        } else {
            format!("{url} (unreachable)")
        },
    );
    if !reachable {
        *all_passed = false;
    }

    let configured = client.is_configured();
    print_check(
        "Note service token",
        configured,
        if configured {
            format!("${} set", config.notes_api.token_env)
        } else {
            format!("${} not set (results will not be posted)", config.notes_api.token_env)
        },
    );
    if !configured {
        *all_passed = false;
    }
}

async fn check_container(config: &Config, all_passed: &mut bool) {
    let docker = DockerContainerManager::new(&config.sandbox);
    let status = docker.status().await;

    let ok = status.error.is_none();
    let detail = match (&status.error, status.exists, status.running) {
        (Some(e), _, _) => format!("{} ({e})", status.name),
        (None, false, _) => format!("{} (not created yet; created on first run)", status.name),
        (None, true, false) => format!("{} (stopped; started on first run)", status.name),
        (None, true, true) if status.healthy => format!("{} (running, healthy)", status.name),
        (None, true, true) => format!("{} (running, not ready)", status.name),
    };
    print_check("Sandbox container", ok, detail);
    if !ok {
        *all_passed = false;
    }
}

fn check_writable(name: &str, path: &std::path::Path, all_passed: &mut bool) {
    let (ok, detail) = if !path.exists() {
        (true, format!("{} (created on first write)", path.display()))
    } else {
        let probe = path.join(".memotic_doctor_probe");
        let writable = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        if writable {
            (true, format!("{} (writable)", path.display()))
        } else {
            (false, format!("{} (not writable)", path.display()))
        }
    };
    print_check(name, ok, detail);
    if !ok {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
