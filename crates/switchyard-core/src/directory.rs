//! Agent directory
//!
//! Registry of known agents indexed by name, domain and capability. Lookups
//! never fail: unknown keys yield empty results, and callers filter by health
//! and breaker state themselves. Agents are never removed at runtime.

use crate::agent::{AgentDescriptor, HealthStatus};
use crate::proxy::AgentProxy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Summary of an agent, as handed to classifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    /// Agent name
    pub name: String,
    /// Domain
    pub domain: String,
    /// Capabilities
    pub capabilities: Vec<String>,
    /// Description
    pub description: String,
}

impl From<&AgentDescriptor> for AgentSummary {
    fn from(d: &AgentDescriptor) -> Self {
        Self {
            name: d.name.clone(),
            domain: d.domain.clone(),
            capabilities: d.capabilities.clone(),
            description: d.description.clone(),
        }
    }
}

/// Directory statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    /// Number of registered agents
    pub total_agents: usize,
    /// Number of domains
    pub domains: usize,
    /// Number of distinct capabilities
    pub capabilities: usize,
    /// Agents per health status
    pub status_breakdown: BTreeMap<HealthStatus, usize>,
    /// Agents per domain
    pub agents_by_domain: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct DirectoryIndex {
    /// Registration order
    order: Vec<String>,
    agents: HashMap<String, AgentDescriptor>,
    domains: Vec<String>,
    by_domain: HashMap<String, Vec<String>>,
    capabilities: Vec<String>,
    by_capability: HashMap<String, Vec<String>>,
}

impl DirectoryIndex {
    fn rebuild(&mut self) {
        self.domains.clear();
        self.by_domain.clear();
        self.capabilities.clear();
        self.by_capability.clear();

        for name in &self.order {
            let Some(agent) = self.agents.get(name) else {
                continue;
            };

            let members = self.by_domain.entry(agent.domain.clone()).or_default();
            if members.is_empty() {
                self.domains.push(agent.domain.clone());
            }
            members.push(name.clone());

            for capability in &agent.capabilities {
                let members = self.by_capability.entry(capability.clone()).or_default();
                if members.is_empty() {
                    self.capabilities.push(capability.clone());
                }
                if !members.contains(name) {
                    members.push(name.clone());
                }
            }
        }
    }

    fn resolve(&self, names: Option<&Vec<String>>) -> Vec<AgentDescriptor> {
        names
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.agents.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Registry of agents
#[derive(Debug, Default)]
pub struct AgentDirectory {
    index: RwLock<DirectoryIndex>,
}

impl AgentDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-loaded with descriptors
    pub async fn with_agents(agents: impl IntoIterator<Item = AgentDescriptor>) -> Self {
        let directory = Self::new();
        directory.register_all(agents).await;
        directory
    }

    /// Register (or replace) an agent by name and rebuild the indexes
    pub async fn register(&self, descriptor: AgentDescriptor) {
        self.register_all([descriptor]).await;
    }

    /// Register several agents, rebuilding the indexes once
    pub async fn register_all(&self, descriptors: impl IntoIterator<Item = AgentDescriptor>) {
        let mut index = self.index.write().await;
        for descriptor in descriptors {
            info!(
                agent = %descriptor.name,
                domain = %descriptor.domain,
                capabilities = ?descriptor.capabilities,
                "Agent registered"
            );
            if !index.agents.contains_key(&descriptor.name) {
                index.order.push(descriptor.name.clone());
            }
            index.agents.insert(descriptor.name.clone(), descriptor);
        }
        index.rebuild();
    }

    /// Look up an agent by name
    pub async fn get(&self, name: &str) -> Option<AgentDescriptor> {
        self.index.read().await.agents.get(name).cloned()
    }

    /// Agents registered under a domain, in registration order
    pub async fn by_domain(&self, domain: &str) -> Vec<AgentDescriptor> {
        let index = self.index.read().await;
        index.resolve(index.by_domain.get(domain))
    }

    /// Agents advertising a capability, in registration order
    pub async fn by_capability(&self, capability: &str) -> Vec<AgentDescriptor> {
        let index = self.index.read().await;
        index.resolve(index.by_capability.get(capability))
    }

    /// Every agent, in registration order
    pub async fn all(&self) -> Vec<AgentDescriptor> {
        let index = self.index.read().await;
        index.resolve(Some(&index.order))
    }

    /// Known domains, in first-registration order
    pub async fn list_domains(&self) -> Vec<String> {
        self.index.read().await.domains.clone()
    }

    /// Known capabilities, in first-registration order
    pub async fn list_capabilities(&self) -> Vec<String> {
        self.index.read().await.capabilities.clone()
    }

    /// Agent summaries for classifiers
    pub async fn summaries(&self) -> Vec<AgentSummary> {
        self.all().await.iter().map(AgentSummary::from).collect()
    }

    /// Set an agent's health; returns false for unknown names
    pub async fn set_health(&self, name: &str, health: HealthStatus) -> bool {
        let mut index = self.index.write().await;
        match index.agents.get_mut(name) {
            Some(agent) => {
                agent.health = health;
                true
            }
            None => false,
        }
    }

    /// Probe one agent and store the observed health
    pub async fn probe(&self, name: &str, proxy: &dyn AgentProxy) -> Option<HealthStatus> {
        let agent = self.get(name).await?;
        let health = probe_health(&agent, proxy).await;
        self.set_health(name, health).await;
        Some(health)
    }

    /// Probe every agent concurrently and store the observed health
    pub async fn probe_all(&self, proxy: &dyn AgentProxy) -> BTreeMap<String, HealthStatus> {
        let agents = self.all().await;
        let probes = agents.iter().map(move |agent| async move {
            (agent.name.clone(), probe_health(agent, proxy).await)
        });
        let results = futures::future::join_all(probes).await;

        {
            let mut index = self.index.write().await;
            for (name, health) in &results {
                if let Some(agent) = index.agents.get_mut(name) {
                    agent.health = *health;
                }
            }
        }

        let healthy = results
            .iter()
            .filter(|(_, h)| *h == HealthStatus::Healthy)
            .count();
        info!(
            total_agents = results.len(),
            healthy = healthy,
            unhealthy = results.len() - healthy,
            "Health check complete"
        );

        results.into_iter().collect()
    }

    /// Counts by health status and domain
    pub async fn stats(&self) -> DirectoryStats {
        let index = self.index.read().await;
        let mut status_breakdown = BTreeMap::new();
        for agent in index.agents.values() {
            *status_breakdown.entry(agent.health).or_insert(0) += 1;
        }

        DirectoryStats {
            total_agents: index.agents.len(),
            domains: index.domains.len(),
            capabilities: index.capabilities.len(),
            status_breakdown,
            agents_by_domain: index
                .by_domain
                .iter()
                .map(|(domain, agents)| (domain.clone(), agents.len()))
                .collect(),
        }
    }
}

async fn probe_health(agent: &AgentDescriptor, proxy: &dyn AgentProxy) -> HealthStatus {
    match proxy.probe(agent).await {
        Ok(true) => HealthStatus::Healthy,
        Ok(false) => {
            warn!(agent = %agent.name, "Agent degraded");
            HealthStatus::Degraded
        }
        Err(_) => HealthStatus::Unavailable,
    }
}
