//! Agent selection
//!
//! Per required capability: exact match, then token-overlap semantic match,
//! then a least-loaded pick. Only healthy agents with a closed breaker are
//! ever candidates. When nothing matches, the first eligible agent of the
//! classified domain is used instead.

use crate::agent::AgentDescriptor;
use crate::routing::ExecutionMode;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::core::Dispatcher;
use super::types::{Classified, Selected};

/// Token-overlap similarity of two capability names.
///
/// Both names are lowercased and split on `delimiter`; the result is the
/// number of shared tokens over the larger token set, in `0.0..=1.0`.
#[must_use]
pub fn capability_similarity(a: &str, b: &str, delimiter: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split(delimiter)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let left = tokens(a);
    let right = tokens(b);

    let larger = left.len().max(right.len());
    if larger == 0 {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    shared as f64 / larger as f64
}

/// Reorder `agents` to follow capability declaration order.
///
/// Each capability maps to the first agent assigned to it; agents not tied
/// to any capability keep their encounter order at the end. Duplicates are
/// dropped.
#[must_use]
pub fn order_by_capabilities(
    capabilities: &[String],
    assignments: &[(String, String)],
    agents: &[String],
) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::with_capacity(agents.len());

    for capability in capabilities {
        let first = assignments
            .iter()
            .find(|(cap, _)| cap == capability)
            .map(|(_, agent)| agent);
        if let Some(agent) = first {
            if agents.contains(agent) && !ordered.contains(agent) {
                ordered.push(agent.clone());
            }
        }
    }

    for agent in agents {
        if !ordered.contains(agent) {
            ordered.push(agent.clone());
        }
    }

    ordered
}

impl Dispatcher {
    fn is_eligible(&self, agent: &AgentDescriptor) -> bool {
        agent.is_healthy() && !self.tracker.is_open(&agent.name)
    }

    /// Agents semantically close enough to `capability`
    fn semantic_candidates(&self, capability: &str, pool: &[AgentDescriptor]) -> Vec<AgentDescriptor> {
        let delimiter = self.config.capability_delimiter.as_str();
        let threshold = self.config.semantic_threshold;

        pool.iter()
            .filter(|agent| {
                agent
                    .capabilities
                    .iter()
                    .any(|own| capability_similarity(capability, own, delimiter) >= threshold)
            })
            .cloned()
            .collect()
    }

    /// Select stage
    pub(super) async fn select(&self, classified: Classified) -> Selected {
        let Classified {
            request,
            classification,
        } = classified;

        let mut pool: Option<Vec<AgentDescriptor>> = None;
        let mut assignments: Vec<(String, String)> = Vec::new();
        let mut chosen: Vec<AgentDescriptor> = Vec::new();

        for capability in &classification.capabilities {
            let mut candidates: Vec<AgentDescriptor> = self
                .directory
                .by_capability(capability)
                .await
                .into_iter()
                .filter(|a| self.is_eligible(a))
                .collect();

            if candidates.is_empty() {
                if pool.is_none() {
                    let eligible = self
                        .directory
                        .all()
                        .await
                        .into_iter()
                        .filter(|a| self.is_eligible(a))
                        .collect();
                    pool = Some(eligible);
                }
                candidates = self.semantic_candidates(capability, pool.as_deref().unwrap_or(&[]));
                if !candidates.is_empty() {
                    info!(
                        capability = %capability,
                        agents = ?candidates.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                        "Semantic match found"
                    );
                }
            }

            let names: Vec<String> = candidates.iter().map(|a| a.name.clone()).collect();
            let Some(picked) = self.tracker.select_least_loaded(&names) else {
                debug!(capability = %capability, "No eligible agent for capability");
                continue;
            };

            if !chosen.iter().any(|a| a.name == picked) {
                if let Some(agent) = candidates.into_iter().find(|a| a.name == picked) {
                    chosen.push(agent);
                }
            }
            assignments.push((capability.clone(), picked));
        }

        let mut fallback_used = false;
        if chosen.is_empty() && !classification.domain.is_empty() {
            let fallback = self
                .directory
                .by_domain(&classification.domain)
                .await
                .into_iter()
                .find(|a| self.is_eligible(a));
            if let Some(agent) = fallback {
                info!(agent = %agent.name, domain = %classification.domain, "Fallback agent selected");
                chosen.push(agent);
                fallback_used = true;
            }
        }

        if classification.execution_mode == ExecutionMode::Sequential {
            let names: Vec<String> = chosen.iter().map(|a| a.name.clone()).collect();
            let order = order_by_capabilities(&classification.capabilities, &assignments, &names);
            chosen.sort_by_key(|a| order.iter().position(|n| *n == a.name));
        }

        if chosen.is_empty() {
            warn!(
                domain = %classification.domain,
                capabilities = ?classification.capabilities,
                "No agents available"
            );
        } else {
            info!(
                agents = ?chosen.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                fallback = fallback_used,
                "Agents selected"
            );
        }

        Selected {
            request,
            classification,
            agents: chosen,
            fallback_used,
        }
    }
}
