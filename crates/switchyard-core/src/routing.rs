//! Routing model
//!
//! Inbound request, classification and the unified result handed back to the
//! caller.

use crate::agent::ContextMap;
use serde::{Deserialize, Serialize};

/// An inbound request to route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRequest {
    /// Session ID
    pub session_id: String,
    /// User ID
    pub user_id: String,
    /// Natural-language request text
    pub message: String,
    /// Caller-supplied context
    pub context: ContextMap,
}

impl RoutingRequest {
    /// Create a request with an empty context
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            context: ContextMap::new(),
        }
    }

    /// Attach a context map
    #[must_use]
    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = context;
        self
    }
}

/// Request urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Time-sensitive
    High,
    /// Standard request
    #[default]
    Medium,
    /// Analytics or reporting
    Low,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Strategy governing order and concurrency of agent calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One agent at a time, context threaded forward, no short-circuit
    #[default]
    Sequential,
    /// All agents at once with the same initial context
    Parallel,
    /// Like sequential, stopping after the first failure
    Conditional,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Conditional => write!(f, "conditional"),
        }
    }
}

/// Structured interpretation of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Target domain
    pub domain: String,
    /// Short description of what the user wants
    #[serde(default)]
    pub intent: String,
    /// Capabilities needed, in the order they should run
    #[serde(default, alias = "required_capabilities")]
    pub capabilities: Vec<String>,
    /// Urgency
    #[serde(default)]
    pub urgency: Urgency,
    /// Whether more than one agent is expected
    #[serde(default)]
    pub multi_agent: bool,
    /// Execution strategy
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

impl Classification {
    /// The fixed classification used when the classifier fails.
    pub fn fallback(domain: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            intent: String::new(),
            capabilities: vec![capability.into()],
            urgency: Urgency::Medium,
            multi_agent: false,
            execution_mode: ExecutionMode::Sequential,
        }
    }
}

/// Why a routing attempt produced no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingFailure {
    /// Selection produced no agents
    NoAgentAvailable,
    /// Every attempted agent failed
    AllAgentsFailed,
}

/// Which successful agents contributed, shaped by execution mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Sequential/conditional: successful agents in execution order
    ExecutionChain(Vec<String>),
    /// Parallel: successful agents, order carries no meaning
    Contributors(Vec<String>),
}

/// Unified routing outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingResult {
    /// Whether at least one agent succeeded
    pub success: bool,
    /// Aggregated message
    pub message: String,
    /// Agent name -> payload
    pub data: ContextMap,
    /// Agents used (successful agents, or the attempted set on failure)
    pub agents_used: Vec<String>,
    /// Execution mode that ran
    pub execution_mode: ExecutionMode,
    /// Chain or contributor list (successful runs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// Classified intent
    pub intent: String,
    /// Classified urgency
    pub urgency: Urgency,
    /// Whether domain fallback selection was used
    pub fallback_used: bool,
    /// Number of agents invoked
    pub total_agents_attempted: usize,
    /// Number of agents that succeeded
    pub successful_agents: usize,
    /// Failure kind when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RoutingFailure>,
    /// Error strings from failed agents
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RoutingResult {
    /// Execution chain, when the run was sequential or conditional
    #[must_use]
    pub fn execution_chain(&self) -> Option<&[String]> {
        match &self.provenance {
            Some(Provenance::ExecutionChain(chain)) => Some(chain),
            _ => None,
        }
    }

    /// Contributor list, when the run was parallel
    #[must_use]
    pub fn contributors(&self) -> Option<&[String]> {
        match &self.provenance {
            Some(Provenance::Contributors(list)) => Some(list),
            _ => None,
        }
    }
}
