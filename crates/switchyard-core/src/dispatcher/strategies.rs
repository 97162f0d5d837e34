//! Execution strategies
//!
//! Sequential and conditional runs make one call at a time and thread each
//! successful payload into the next agent's context. Parallel runs fan out
//! with the caller's context untouched and wait for every call.

use crate::agent::{AgentCallResult, AgentDescriptor, AgentRequest, ContextMap};
use crate::routing::{Classification, ExecutionMode, RoutingRequest};
use crate::session::HistoryRecord;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::aggregate::context_key;
use super::core::Dispatcher;
use super::types::{Executed, Selected};

fn build_request(
    request: &RoutingRequest,
    classification: &Classification,
    context: ContextMap,
) -> AgentRequest {
    let mut metadata = ContextMap::new();
    metadata.insert(
        "intent".to_string(),
        Value::String(classification.intent.clone()),
    );
    metadata.insert(
        "urgency".to_string(),
        Value::String(classification.urgency.to_string()),
    );
    metadata.insert(
        "execution_mode".to_string(),
        Value::String(classification.execution_mode.to_string()),
    );

    AgentRequest {
        session_id: request.session_id.clone(),
        user_id: request.user_id.clone(),
        message: request.message.clone(),
        context,
        metadata,
    }
}

impl Dispatcher {
    /// Execute stage
    pub(super) async fn execute(&self, selected: Selected) -> Executed {
        let Selected {
            request,
            classification,
            agents,
            fallback_used,
        } = selected;

        let results = if agents.is_empty() {
            Vec::new()
        } else {
            match classification.execution_mode {
                ExecutionMode::Sequential => {
                    self.run_chain(&request, &classification, &agents, false).await
                }
                ExecutionMode::Conditional => {
                    self.run_chain(&request, &classification, &agents, true).await
                }
                ExecutionMode::Parallel => {
                    self.run_parallel(&request, &classification, &agents).await
                }
            }
        };

        Executed {
            classification,
            agents: agents.into_iter().map(|a| a.name).collect(),
            fallback_used,
            results,
        }
    }

    /// One agent at a time; `stop_on_failure` makes it conditional
    async fn run_chain(
        &self,
        request: &RoutingRequest,
        classification: &Classification,
        agents: &[AgentDescriptor],
        stop_on_failure: bool,
    ) -> Vec<AgentCallResult> {
        let mut context = request.context.clone();
        let mut results = Vec::with_capacity(agents.len());

        for agent in agents {
            let agent_request = build_request(request, classification, context.clone());
            let result = self.invoker.call(agent, &agent_request).await;

            let mut variables = None;
            if result.success {
                if let Some(data) = &result.data {
                    let key = context_key(&agent.name);
                    debug!(agent = %agent.name, key = %key, "Context threaded to next agent");
                    context.insert(key.clone(), Value::Object(data.clone()));

                    let mut vars = ContextMap::new();
                    vars.insert(key, Value::Object(data.clone()));
                    variables = Some(vars);
                }
            }
            self.record_step(request, &result, variables).await;

            let failed = !result.success;
            results.push(result);

            if stop_on_failure && failed {
                info!(
                    agent = %agent.name,
                    skipped = agents.len() - results.len(),
                    "Conditional execution stopped after failure"
                );
                break;
            }
        }

        results
    }

    /// All agents at once, same initial context
    async fn run_parallel(
        &self,
        request: &RoutingRequest,
        classification: &Classification,
        agents: &[AgentDescriptor],
    ) -> Vec<AgentCallResult> {
        info!(agent_count = agents.len(), "Executing agents in parallel");

        let handles: Vec<_> = agents
            .iter()
            .map(|agent| {
                let invoker = self.invoker.clone();
                let agent = agent.clone();
                let agent_request = build_request(request, classification, request.context.clone());
                tokio::spawn(async move { invoker.call(&agent, &agent_request).await })
            })
            .collect();

        let joined = join_all(handles).await;

        let results: Vec<AgentCallResult> = joined
            .into_iter()
            .zip(agents)
            .map(|(outcome, agent)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(agent = %agent.name, error = %e, "Agent task aborted");
                    AgentCallResult::failure(
                        &agent.name,
                        format!("Agent task aborted: {}", e),
                        Duration::ZERO,
                    )
                }
            })
            .collect();

        for result in &results {
            self.record_step(request, result, None).await;
        }

        results
    }

    /// Report one step to the session store; store errors never abort routing
    async fn record_step(
        &self,
        request: &RoutingRequest,
        result: &AgentCallResult,
        variables: Option<ContextMap>,
    ) {
        let record = HistoryRecord {
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
            agent_name: result.agent_name.clone(),
            user_message: request.message.clone(),
            agent_response: result
                .message
                .clone()
                .or_else(|| result.error.clone())
                .unwrap_or_default(),
            metadata: result.metadata.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.append_history(record).await {
            warn!(session_id = %request.session_id, error = %e, "Failed to save conversation");
        }
        if let Err(e) = self
            .store
            .update(&request.session_id, Some(&result.agent_name), variables)
            .await
        {
            warn!(session_id = %request.session_id, error = %e, "Failed to update session");
        }
    }
}
