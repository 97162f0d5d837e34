//! Error types for switchyard-core
//!
//! Agent call failures never surface through this type during routing; they
//! are folded into `AgentCallResult` values. `Error` covers configuration,
//! transport and collaborator failures.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid agent catalog or dispatcher setting
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Network/connection error talking to an agent
    #[error("network error: {0}")]
    Network(String),

    /// Agent call exceeded its timeout
    #[error("agent '{agent}' timed out after {secs}s")]
    Timeout {
        /// Agent name
        agent: String,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// Agent answered with a non-success HTTP status
    #[error("agent '{agent}' returned HTTP {status}")]
    AgentStatus {
        /// Agent name
        agent: String,
        /// HTTP status code
        status: u16,
    },

    /// Classifier call or parse failure
    #[error("classification error: {0}")]
    Classification(String),

    /// Session store failure
    #[error("session store error: {0}")]
    Store(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Human-readable error messages and fix suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::InvalidConfig { field, message } => {
                format!("Configuration error in '{}': {}", field, message)
            }
            Error::Network(msg) => format!("Could not reach agent: {}", msg),
            Error::Timeout { agent, secs } => {
                format!("Agent '{}' did not answer within {} seconds.", agent, secs)
            }
            Error::AgentStatus { agent, status } => {
                format!("Agent '{}' rejected the request (HTTP {}).", agent, status)
            }
            Error::Classification(msg) => format!("Could not classify request: {}", msg),
            Error::Store(msg) => format!("Session store problem: {}", msg),
            Error::Serialization(e) => format!("Malformed data: {}", e),
            Error::Internal(msg) => format!("Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::InvalidConfig { field, .. } => Some(format!(
                "Check the '{}' setting in config/default.toml or the SWITCHYARD_ environment variables.",
                field
            )),
            Error::Network(_) | Error::Timeout { .. } => {
                Some("Run `switchyard health` to see which agents are reachable.".to_string())
            }
            Error::AgentStatus { .. } => {
                Some("Check the agent's logs; its execute endpoint failed.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    output.push('\n');

    if let Some(suggestion) = error.suggestion() {
        output.push('\n');
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}
