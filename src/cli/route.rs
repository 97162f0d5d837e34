//! `switchyard route`

use crate::app::{build_app, load_config};
use anyhow::{bail, Result};
use clap::Args;
use serde_json::{json, Value};
use switchyard_core::{ContextMap, RoutingRequest, SessionStore};
use tracing::info;

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Request text
    pub message: String,

    /// Session ID (a new one is generated when omitted)
    #[arg(long)]
    pub session: Option<String>,

    /// User ID
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// Context entries as key=value; values that parse as JSON are kept typed
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// Probe agent health before routing
    #[arg(long)]
    pub probe: bool,
}

/// Parse `key=value` pairs into a context map
pub fn parse_context(entries: &[String]) -> Result<ContextMap> {
    let mut context = ContextMap::new();
    for entry in entries {
        let Some((key, raw)) = entry.split_once('=') else {
            bail!("context entry '{}' must look like key=value", entry);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("context entry '{}' has an empty key", entry);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

pub async fn run(args: RouteArgs) -> Result<()> {
    let context = parse_context(&args.context)?;
    let app = build_app(load_config()?).await?;

    if args.probe || !app.config.assume_healthy {
        let health = app.directory.probe_all(app.proxy.as_ref()).await;
        info!(probed = health.len(), "Agent health refreshed");
    }

    let session_id = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request =
        RoutingRequest::new(session_id.clone(), args.user, args.message).with_context(context);

    let result = app.dispatcher.route(request).await;
    let history = app
        .store
        .get_history(&session_id, app.config.session.history_limit)
        .await?;

    let output = json!({
        "session_id": session_id,
        "result": result,
        "history": history,
        "stats": app.dispatcher.routing_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
