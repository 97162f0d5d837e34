//! `switchyard health`

use crate::app::{build_app, load_config};
use anyhow::Result;
use std::collections::BTreeMap;
use switchyard_core::HealthStatus;

pub async fn run() -> Result<()> {
    let app = build_app(load_config()?).await?;
    let results = app.directory.probe_all(app.proxy.as_ref()).await;

    println!("{}", serde_json::to_string_pretty(&results)?);

    let mut counts: BTreeMap<HealthStatus, usize> = BTreeMap::new();
    for status in results.values() {
        *counts.entry(*status).or_insert(0) += 1;
    }
    let summary: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{} {}", count, status))
        .collect();
    eprintln!("{} agents probed: {}", results.len(), summary.join(", "));
    Ok(())
}
