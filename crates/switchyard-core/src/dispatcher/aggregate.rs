//! Result aggregation
//!
//! Only successful results contribute messages and data. Sequential and
//! conditional runs keep execution order; parallel runs list contributors.

use crate::agent::{AgentCallResult, ContextMap};
use crate::routing::{Classification, ExecutionMode, Provenance, RoutingFailure, RoutingResult};
use serde_json::Value;
use tracing::{info, warn};

const NO_AGENT_MESSAGE: &str = "No agents available to handle this request";
const ALL_FAILED_MESSAGE: &str = "All agents failed to process request";
const CHAIN_SEPARATOR: &str = " → ";

/// Context key under which an agent's payload is passed to later agents
#[must_use]
pub fn context_key(agent: &str) -> String {
    format!("{}_output", agent)
}

fn failure_result(
    classification: &Classification,
    results: &[AgentCallResult],
    fallback_used: bool,
    failure: RoutingFailure,
) -> RoutingResult {
    let message = match failure {
        RoutingFailure::NoAgentAvailable => NO_AGENT_MESSAGE,
        RoutingFailure::AllAgentsFailed => ALL_FAILED_MESSAGE,
    };
    let errors: Vec<String> = results
        .iter()
        .filter_map(|r| r.error.clone())
        .filter(|e| !e.is_empty())
        .collect();

    RoutingResult {
        success: false,
        message: message.to_string(),
        data: ContextMap::new(),
        agents_used: results.iter().map(|r| r.agent_name.clone()).collect(),
        execution_mode: classification.execution_mode,
        provenance: None,
        intent: classification.intent.clone(),
        urgency: classification.urgency,
        fallback_used,
        total_agents_attempted: results.len(),
        successful_agents: 0,
        failure: Some(failure),
        errors,
    }
}

/// Combine per-agent results into one routing result
#[must_use]
pub fn aggregate(
    classification: &Classification,
    results: &[AgentCallResult],
    fallback_used: bool,
) -> RoutingResult {
    if results.is_empty() {
        return failure_result(
            classification,
            results,
            fallback_used,
            RoutingFailure::NoAgentAvailable,
        );
    }

    let successful: Vec<&AgentCallResult> = results.iter().filter(|r| r.success).collect();
    if successful.is_empty() {
        warn!(attempted = results.len(), "All agents failed");
        return failure_result(
            classification,
            results,
            fallback_used,
            RoutingFailure::AllAgentsFailed,
        );
    }

    let names: Vec<String> = successful.iter().map(|r| r.agent_name.clone()).collect();
    let data: ContextMap = successful
        .iter()
        .filter_map(|r| {
            r.data
                .as_ref()
                .map(|d| (r.agent_name.clone(), Value::Object(d.clone())))
        })
        .collect();
    let messages: Vec<(&str, &str)> = successful
        .iter()
        .filter_map(|r| {
            r.message
                .as_deref()
                .filter(|m| !m.is_empty())
                .map(|m| (r.agent_name.as_str(), m))
        })
        .collect();

    let (message, provenance) = match classification.execution_mode {
        ExecutionMode::Sequential | ExecutionMode::Conditional => {
            let message = if messages.is_empty() {
                "Request processed successfully".to_string()
            } else {
                messages
                    .iter()
                    .map(|(agent, msg)| format!("{}: {}", agent, msg))
                    .collect::<Vec<_>>()
                    .join(CHAIN_SEPARATOR)
            };
            (message, Provenance::ExecutionChain(names.clone()))
        }
        ExecutionMode::Parallel => {
            let message = if messages.is_empty() {
                format!("Data collected from {} agents", successful.len())
            } else {
                let lines: Vec<String> = messages
                    .iter()
                    .map(|(agent, msg)| format!("• {}: {}", agent, msg))
                    .collect();
                format!("Combined results:\n{}", lines.join("\n"))
            };
            (message, Provenance::Contributors(names.clone()))
        }
    };

    info!(
        mode = %classification.execution_mode,
        attempted = results.len(),
        successful = successful.len(),
        "Results aggregated"
    );

    RoutingResult {
        success: true,
        message,
        data,
        successful_agents: names.len(),
        agents_used: names,
        execution_mode: classification.execution_mode,
        provenance: Some(provenance),
        intent: classification.intent.clone(),
        urgency: classification.urgency,
        fallback_used,
        total_agents_attempted: results.len(),
        failure: None,
        errors: results
            .iter()
            .filter_map(|r| r.error.clone())
            .filter(|e| !e.is_empty())
            .collect(),
    }
}
