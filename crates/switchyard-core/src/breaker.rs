//! Breaker & load tracker
//!
//! Per-agent consecutive-failure counters (the circuit breaker) and load
//! counters (round-robin tie-breaking). Counters live in sharded maps, so
//! every read-modify-write on one agent's counter is atomic without a global
//! lock. State is in-process only; a restart closes every breaker.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Breaker state derived from an agent's failure counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Agent is eligible for selection
    Closed,
    /// Failure counter reached the threshold; agent is skipped
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
        }
    }
}

/// Snapshot of tracker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingStats {
    /// Agent -> consecutive failures
    pub agent_failure_counts: BTreeMap<String, u32>,
    /// Agent -> times selected
    pub agent_load_counter: BTreeMap<String, u64>,
    /// Agents whose breaker is open
    pub circuit_breakers_open: Vec<String>,
}

/// Failure and load counters for every agent
#[derive(Debug)]
pub struct BreakerTracker {
    threshold: u32,
    failures: DashMap<String, u32>,
    loads: DashMap<String, u64>,
}

impl Default for BreakerTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl BreakerTracker {
    /// Create a tracker that opens an agent's breaker after `threshold`
    /// consecutive failures
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            failures: DashMap::new(),
            loads: DashMap::new(),
        }
    }

    /// Failure threshold
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current consecutive failure count
    #[must_use]
    pub fn failure_count(&self, agent: &str) -> u32 {
        self.failures.get(agent).map(|c| *c).unwrap_or(0)
    }

    /// Current load counter
    #[must_use]
    pub fn load_count(&self, agent: &str) -> u64 {
        self.loads.get(agent).map(|c| *c).unwrap_or(0)
    }

    /// Breaker state for an agent
    #[must_use]
    pub fn state(&self, agent: &str) -> CircuitState {
        if self.failure_count(agent) >= self.threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// True when the agent's failure counter is at or above the threshold
    #[must_use]
    pub fn is_open(&self, agent: &str) -> bool {
        let open = self.state(agent) == CircuitState::Open;
        if open {
            debug!(agent = %agent, failures = self.failure_count(agent), "Circuit breaker open");
        }
        open
    }

    /// Record a successful call; closes the breaker
    pub fn record_success(&self, agent: &str) {
        if let Some(mut count) = self.failures.get_mut(agent) {
            if *count >= self.threshold {
                info!(agent = %agent, "Circuit breaker closed");
            }
            *count = 0;
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, agent: &str) {
        let mut count = self.failures.entry(agent.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        debug!(
            agent = %agent,
            failures = *count,
            threshold = self.threshold,
            "Circuit breaker failure recorded"
        );

        if *count == self.threshold {
            warn!(agent = %agent, failures = *count, "Circuit breaker opened");
        }
    }

    /// Pick the candidate with the smallest load counter and bump it.
    ///
    /// Ties go to the earliest candidate in the slice. Returns `None` for an
    /// empty slice.
    pub fn select_least_loaded(&self, candidates: &[String]) -> Option<String> {
        let mut best: Option<(&String, u64)> = None;
        for candidate in candidates {
            let load = self.load_count(candidate);
            match best {
                Some((_, best_load)) if best_load <= load => {}
                _ => best = Some((candidate, load)),
            }
        }

        let (selected, _) = best?;
        let mut load = self.loads.entry(selected.clone()).or_insert(0);
        *load = load.saturating_add(1);
        debug!(agent = %selected, load = *load, "Agent selected by load");
        Some(selected.clone())
    }

    /// Clear an agent's failure counter
    pub fn reset(&self, agent: &str) {
        if self.failures.remove(agent).is_some() {
            info!(agent = %agent, "Circuit breaker reset");
        }
    }

    /// Clear every failure counter
    pub fn reset_all(&self) {
        self.failures.clear();
        info!("All circuit breakers reset");
    }

    /// Snapshot counters for monitoring
    #[must_use]
    pub fn stats(&self) -> RoutingStats {
        let agent_failure_counts: BTreeMap<String, u32> = self
            .failures
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let circuit_breakers_open = agent_failure_counts
            .iter()
            .filter(|(_, count)| **count >= self.threshold)
            .map(|(name, _)| name.clone())
            .collect();

        RoutingStats {
            agent_failure_counts,
            agent_load_counter: self
                .loads
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            circuit_breakers_open,
        }
    }
}
