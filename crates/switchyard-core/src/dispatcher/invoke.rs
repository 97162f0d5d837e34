//! Single-agent invocation with retry
//!
//! Every attempt reports to the breaker tracker: success zeroes the agent's
//! counter, failure bumps it. Only the last attempt's outcome is returned.

use crate::agent::{AgentCallResult, AgentDescriptor, AgentRequest};
use crate::breaker::BreakerTracker;
use crate::proxy::AgentProxy;
use crate::retry::{retry_with_backoff, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub(crate) struct Invoker {
    proxy: Arc<dyn AgentProxy>,
    tracker: Arc<BreakerTracker>,
    backoff_unit: Duration,
}

impl Invoker {
    pub(crate) fn new(
        proxy: Arc<dyn AgentProxy>,
        tracker: Arc<BreakerTracker>,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            proxy,
            tracker,
            backoff_unit,
        }
    }

    pub(crate) fn with_tracker(mut self, tracker: Arc<BreakerTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Call one agent, retrying up to its `retry_count`
    pub(crate) async fn call(&self, agent: &AgentDescriptor, request: &AgentRequest) -> AgentCallResult {
        let policy = RetryPolicy::new(agent.retry_count, self.backoff_unit);
        let mut last_start = Instant::now();

        let outcome = retry_with_backoff(&policy, |attempt| {
            last_start = Instant::now();
            async move {
                debug!(agent = %agent.name, attempt = attempt + 1, "Calling agent");
                match self.proxy.execute(agent, request).await {
                    Ok(reply) if reply.success => {
                        self.tracker.record_success(&agent.name);
                        Ok(reply)
                    }
                    Ok(reply) => {
                        self.tracker.record_failure(&agent.name);
                        Err(reply
                            .error
                            .unwrap_or_else(|| "agent reported failure".to_string()))
                    }
                    Err(e) => {
                        self.tracker.record_failure(&agent.name);
                        Err(e.to_string())
                    }
                }
            }
        })
        .await;

        let duration = last_start.elapsed();
        match outcome {
            Ok(reply) => {
                info!(
                    agent = %agent.name,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Agent call succeeded"
                );
                AgentCallResult::from_reply(&agent.name, reply, duration)
            }
            Err(e) => {
                warn!(agent = %agent.name, attempts = e.attempts, error = %e.last_error, "Agent call failed");
                AgentCallResult::failure(&agent.name, e.to_string(), duration)
            }
        }
    }
}
