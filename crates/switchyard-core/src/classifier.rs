//! Request classification
//!
//! A classifier turns message text plus the directory's catalogs into a
//! [`Classification`]. The dispatcher treats any classifier error as a signal
//! to use its fixed fallback classification, so implementations may fail
//! freely.

use crate::directory::AgentSummary;
use crate::error::Result;
use crate::routing::Classification;
use async_trait::async_trait;

mod keyword;
mod prompt;

pub use keyword::KeywordClassifier;
pub use prompt::{build_prompt, parse_classification, CompletionBackend, PromptClassifier};

#[cfg(test)]
pub use prompt::MockCompletionBackend;

/// Everything a classifier may look at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierInput {
    /// Message text
    pub message: String,
    /// Known domains
    pub domains: Vec<String>,
    /// Known capabilities
    pub capabilities: Vec<String>,
    /// Registered agents
    pub agents: Vec<AgentSummary>,
}

/// Intent classifier
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one request
    async fn classify(&self, input: &ClassifierInput) -> Result<Classification>;
}
