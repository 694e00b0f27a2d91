use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mt_domain::config::Config;
use mt_engine::Headers;

use crate::api::webhooks::WebhookResponse;
use crate::bootstrap;

/// `name=value` or `name: value`; names are lower-cased.
pub fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let at = raw
        .find(['=', ':'])
        .with_context(|| format!("header {raw:?} is not name=value"))?;
    let (name, value) = (&raw[..at], &raw[at + 1..]);
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header {raw:?} has an empty name");
    }
    Ok((name.to_lowercase(), value.trim().to_owned()))
}

/// Dispatch one payload through the full production wiring.
pub async fn run(config: Arc<Config>, file: &Path, raw_headers: &[String]) -> anyhow::Result<()> {
    let body = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let payload: serde_json::Value =
        serde_json::from_slice(&body).with_context(|| format!("parsing {}", file.display()))?;
    let headers = raw_headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<anyhow::Result<Headers>>()?;

    let state = bootstrap::build_app_state(config)?;
    let result = state.dispatcher.dispatch(&payload, &headers).await;

    println!("{}", serde_json::to_string_pretty(&WebhookResponse::from(result))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_forms() {
        assert_eq!(
            parse_header("X-Memos-Event=memo.created").unwrap(),
            ("x-memos-event".into(), "memo.created".into())
        );
        assert_eq!(
            parse_header("x-action: update").unwrap(),
            ("x-action".into(), "update".into())
        );
        assert!(parse_header("novalue").is_err());
        assert!(parse_header("=x").is_err());
    }
}
