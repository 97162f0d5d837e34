//! Stage records
//!
//! Each stage takes ownership of the previous record and returns the next
//! one; no stage edits an earlier stage's output.

use crate::agent::{AgentCallResult, AgentDescriptor};
use crate::routing::{Classification, RoutingRequest};

/// Output of the classify stage
#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub request: RoutingRequest,
    pub classification: Classification,
}

/// Output of the select stage
#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub request: RoutingRequest,
    pub classification: Classification,
    /// Agents to run, in execution order
    pub agents: Vec<AgentDescriptor>,
    pub fallback_used: bool,
}

/// Output of the execute stage
#[derive(Debug, Clone)]
pub(crate) struct Executed {
    pub classification: Classification,
    pub agents: Vec<String>,
    pub fallback_used: bool,
    pub results: Vec<AgentCallResult>,
}
