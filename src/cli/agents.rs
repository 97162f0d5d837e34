//! `switchyard agents`

use crate::app::{build_app, load_config};
use anyhow::Result;
use serde_json::json;

pub async fn run() -> Result<()> {
    let app = build_app(load_config()?).await?;

    let output = json!({
        "stats": app.directory.stats().await,
        "agents": app.directory.all().await,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
