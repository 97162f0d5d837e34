//! Agent model
//!
//! Descriptors for the remote agents the dispatcher can call, plus the wire
//! request/reply shapes and the per-call result record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Free-form JSON object used for context, payloads and metadata.
pub type ContextMap = Map<String, Value>;

/// Health status of an agent, as last observed by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Probe succeeded
    Healthy,
    /// Agent answered the probe but not with success
    Degraded,
    /// Agent could not be reached
    Unavailable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDescriptor {
    /// Unique agent name
    pub name: String,
    /// Domain the agent belongs to
    pub domain: String,
    /// Advertised capabilities, in declaration order
    pub capabilities: Vec<String>,
    /// Human-readable description (fed to classifiers)
    pub description: String,
    /// Base URL of the agent service
    pub url: String,
    /// Path probed for health checks
    pub health_check_path: String,
    /// Execution timeout for one call
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Number of retries after the first attempt
    pub retry_count: u32,
    /// Last observed health
    pub health: HealthStatus,
}

impl AgentDescriptor {
    /// Create a descriptor with default probe path, timeout and retry count.
    ///
    /// New descriptors start `Unavailable` until a probe says otherwise.
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        url: impl Into<String>,
        capabilities: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            description: String::new(),
            url: url.into(),
            health_check_path: "/health".to_string(),
            timeout: Duration::from_secs(30),
            retry_count: 3,
            health: HealthStatus::Unavailable,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the health check path
    #[must_use]
    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = path.into();
        self
    }

    /// Set the health status
    #[must_use]
    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    /// Whether the last probe reported the agent healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health == HealthStatus::Healthy
    }
}

/// Request body sent to an agent's execute endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Session ID
    pub session_id: String,
    /// User ID
    pub user_id: String,
    /// The user's message
    pub message: String,
    /// Context visible to the agent
    #[serde(default)]
    pub context: ContextMap,
    /// Routing metadata (intent, urgency, execution mode)
    #[serde(default)]
    pub metadata: ContextMap,
}

/// Response body returned by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Whether the agent handled the request
    pub success: bool,
    /// Structured payload
    #[serde(default)]
    pub data: Option<ContextMap>,
    /// Human-readable answer
    #[serde(default)]
    pub message: Option<String>,
    /// Error text when `success` is false
    #[serde(default)]
    pub error: Option<String>,
    /// Agent-supplied metadata
    #[serde(default)]
    pub metadata: Option<ContextMap>,
}

impl AgentReply {
    /// Successful reply with a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Failed reply with an error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_data(mut self, data: ContextMap) -> Self {
        self.data = Some(data);
        self
    }
}

/// Outcome of invoking one agent (the final attempt when retried).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCallResult {
    /// Agent that was called
    pub agent_name: String,
    /// Whether the call succeeded
    pub success: bool,
    /// Payload returned by the agent
    pub data: Option<ContextMap>,
    /// Error text
    pub error: Option<String>,
    /// Free-text answer
    pub message: Option<String>,
    /// Agent-supplied metadata
    pub metadata: ContextMap,
    /// Wall-clock duration of the final attempt
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
}

impl AgentCallResult {
    /// Build a result from an agent's reply
    pub fn from_reply(agent_name: impl Into<String>, reply: AgentReply, duration: Duration) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: reply.success,
            data: reply.data,
            error: reply.error,
            message: reply.message,
            metadata: reply.metadata.unwrap_or_default(),
            duration,
        }
    }

    /// Build a failure result carrying only an error
    pub fn failure(agent_name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            metadata: ContextMap::new(),
            duration,
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
