//! Switchyard Core - Agent Dispatch Engine
//!
//! This crate routes natural-language requests to specialized backend agents:
//! - Directory: Agent registry indexed by name, domain and capability
//! - Breaker: Per-agent failure counters and round-robin load counters
//! - Classifier: Pluggable request classification (keyword or model-backed)
//! - Dispatcher: Classify, select, execute and aggregate
//! - Proxy: Remote agent calls and health probes
//! - Session: Session store contract and in-memory store
//! - Retry: Exponential backoff

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod breaker;
pub mod classifier;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod proxy;
pub mod retry;
pub mod routing;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{
    AgentCallResult, AgentDescriptor, AgentReply, AgentRequest, ContextMap, HealthStatus,
};
pub use breaker::{BreakerTracker, CircuitState, RoutingStats};
pub use classifier::{
    Classifier, ClassifierInput, CompletionBackend, KeywordClassifier, PromptClassifier,
};
pub use config::{descriptors_from_catalog, AgentCatalog, AgentSpec, DispatcherConfig};
pub use directory::{AgentDirectory, AgentSummary, DirectoryStats};
pub use dispatcher::Dispatcher;
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use proxy::{AgentProxy, HttpAgentProxy};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use routing::{
    Classification, ExecutionMode, Provenance, RoutingFailure, RoutingRequest, RoutingResult,
    Urgency,
};
pub use session::{
    HistoryRecord, MemorySessionStore, SessionContext, SessionStore, DEFAULT_HISTORY_LIMIT,
};
