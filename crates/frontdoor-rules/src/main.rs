//! # Front Door Rules Demo
//!
//! Reconciles a delivery rule (and optionally the tags of its resource group) against the
//! in-memory management plane: create, read, update, delete.
//!
//! ```bash
//! RUST_LOG=info cargo run -p frontdoor-rules                 # built-in sample
//! RUST_LOG=debug cargo run -p frontdoor-rules -- rule.json   # your own document
//! ```
//!
//! The document holds a `rule` object and an optional `tags` object, each shaped like the
//! desired state of its resource kind. The update step flips `behavior_on_match` and moves
//! the rule one position down.

use frontdoor_rules::lifecycle::{RuleSystem, SystemConfig};
use reconcile_framework::tracing::setup_tracing;
use reconcile_framework::{Fragment, ReadOutcome, ReconcileError, ResourceInstance};
use serde_json::{json, Value};
use tokio::task::JoinError;
use tracing::{info, info_span, Instrument};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing the desired-state document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("the document needs a `{0}` object")]
    Missing(&'static str),
    #[error("loading configuration: {0}")]
    Config(#[from] envconfig::Error),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("plane task failed: {0}")]
    Join(#[from] JoinError),
}

fn sample() -> Value {
    json!({
        "rule": {
            "name": "HttpsRedirect",
            "cdn_frontdoor_rule_set_id": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/edge/providers/Microsoft.Cdn/profiles/contoso/ruleSets/default",
            "order": 1,
            "behavior_on_match": "Continue",
            "conditions": {
                "request_scheme_condition": [{ "operator": "Equal", "match_values": ["HTTP"] }]
            },
            "actions": {
                "url_redirect_action": [{
                    "redirect_type": "PermanentRedirect",
                    "redirect_protocol": "Https",
                    "destination_hostname": "www.contoso.com"
                }],
                "response_header_action": [{
                    "header_action": "Overwrite",
                    "header_name": "Strict-Transport-Security",
                    "value": "max-age=31536000"
                }]
            }
        },
        "tags": {
            "resource_id": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/edge",
            "tags": { "team": "edge", "env": "demo" }
        }
    })
}

fn load(path: Option<String>) -> Result<Value, DemoError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|source| DemoError::Read { path, source })?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(sample()),
    }
}

fn object(document: &Value, field: &'static str) -> Option<Fragment> {
    document.get(field).and_then(Value::as_object).cloned()
}

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    setup_tracing();

    let document = load(std::env::args().nth(1))?;
    let rule = object(&document, "rule").ok_or(DemoError::Missing("rule"))?;
    let tags = object(&document, "tags");

    let config = SystemConfig::from_env()?;
    let system = RuleSystem::new(&config);

    let mut instance = ResourceInstance::absent();
    async {
        let state = system.rules.create(&mut instance, &rule).await?;
        info!(order = %state["order"], "Rule created");
        Ok::<_, DemoError>(())
    }
    .instrument(info_span!("create"))
    .await?;

    if let ReadOutcome::Present(state) = system.rules.read(&mut instance).await? {
        info!(actions = %state["actions"], conditions = %state["conditions"], "Rule read");
    }

    let mut changed = rule.clone();
    let flipped = match rule.get("behavior_on_match").and_then(Value::as_str) {
        Some("Stop") => "Continue",
        _ => "Stop",
    };
    let next_order = rule.get("order").and_then(Value::as_u64).unwrap_or_default() + 1;
    changed.insert("behavior_on_match".into(), json!(flipped));
    changed.insert("order".into(), json!(next_order));
    let state = system
        .rules
        .update(&mut instance, &changed)
        .instrument(info_span!("update"))
        .await?;
    info!(behavior_on_match = %state["behavior_on_match"], order = %state["order"], "Rule updated");

    system.rules.delete(&mut instance).await?;
    info!(phase = %instance.phase(), "Rule deleted");

    if let Some(tags) = tags {
        let mut instance = ResourceInstance::absent();
        system.tags.create(&mut instance, &tags).await?;
        let mut retagged = tags.clone();
        if let Some(Value::Object(values)) = retagged.get_mut("tags") {
            values.insert("stage".into(), json!("updated"));
        }
        let state = system.tags.update(&mut instance, &retagged).await?;
        info!(tags = %state["tags"], "Tags updated");
        system.tags.delete(&mut instance).await?;
    }

    system.shutdown().await?;
    Ok(())
}
