//! Static configuration
//!
//! The agent catalog (domain → agent → settings) and dispatcher tuning. Both
//! deserialize from the `[agents]` and `[dispatcher]` tables of the app
//! config.

use crate::agent::{AgentDescriptor, HealthStatus};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Consecutive failures that open an agent's breaker
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    /// Minimum token-overlap similarity for semantic capability matches
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    /// Delimiter splitting capability names into tokens
    #[serde(default = "default_capability_delimiter")]
    pub capability_delimiter: String,
    /// Domain used when classification fails
    #[serde(default = "default_domain")]
    pub default_domain: String,
    /// Capability used when classification fails
    #[serde(default = "default_capability")]
    pub default_capability: String,
    /// One backoff time unit in milliseconds (delay = unit * 2^attempt)
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_semantic_threshold() -> f64 {
    0.7
}

fn default_capability_delimiter() -> String {
    "_".to_string()
}

fn default_domain() -> String {
    "general".to_string()
}

fn default_capability() -> String {
    "general".to_string()
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            breaker_threshold: default_breaker_threshold(),
            semantic_threshold: default_semantic_threshold(),
            capability_delimiter: default_capability_delimiter(),
            default_domain: default_domain(),
            default_capability: default_capability(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl DispatcherConfig {
    /// Backoff time unit
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.breaker_threshold == 0 {
            return Err(Error::invalid_config(
                "dispatcher.breaker_threshold",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(Error::invalid_config(
                "dispatcher.semantic_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.capability_delimiter.is_empty() {
            return Err(Error::invalid_config(
                "dispatcher.capability_delimiter",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Settings for one agent in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Base URL
    pub url: String,
    /// Advertised capabilities
    pub capabilities: Vec<String>,
    /// Description shown to classifiers
    #[serde(default)]
    pub description: String,
    /// Health probe path
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// Call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

/// Domain → agent name → settings
///
/// Ordered maps keep registration order deterministic.
pub type AgentCatalog = BTreeMap<String, BTreeMap<String, AgentSpec>>;

/// Validate a catalog and turn it into descriptors, in catalog order.
///
/// Descriptors start `initial_health`; pass `Unavailable` to require a probe
/// before an agent is selectable.
pub fn descriptors_from_catalog(
    catalog: &AgentCatalog,
    initial_health: HealthStatus,
) -> Result<Vec<AgentDescriptor>> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();

    for (domain, agents) in catalog {
        for (name, spec) in agents {
            let field = format!("agents.{}.{}", domain, name);

            if !seen.insert(name.as_str()) {
                return Err(Error::invalid_config(
                    field,
                    "agent name is registered under more than one domain",
                ));
            }
            if spec.url.trim().is_empty() {
                return Err(Error::invalid_config(
                    format!("{}.url", field),
                    "must not be empty",
                ));
            }
            if !(spec.url.starts_with("http://") || spec.url.starts_with("https://")) {
                return Err(Error::invalid_config(
                    format!("{}.url", field),
                    "must start with http:// or https://",
                ));
            }
            if spec.capabilities.is_empty() {
                return Err(Error::invalid_config(
                    format!("{}.capabilities", field),
                    "at least one capability is required",
                ));
            }
            if spec.timeout_secs == 0 {
                return Err(Error::invalid_config(
                    format!("{}.timeout_secs", field),
                    "must be positive",
                ));
            }

            descriptors.push(
                AgentDescriptor::new(
                    name.clone(),
                    domain.clone(),
                    spec.url.trim_end_matches('/'),
                    spec.capabilities.iter().cloned(),
                )
                .with_description(spec.description.clone())
                .with_health_check_path(spec.health_check_path.clone())
                .with_timeout(Duration::from_secs(spec.timeout_secs))
                .with_retry_count(spec.retry_count)
                .with_health(initial_health),
            );
        }
    }

    Ok(descriptors)
}
