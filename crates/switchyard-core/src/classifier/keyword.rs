//! Deterministic keyword classifier
//!
//! Matches message words against capability tokens and picks urgency and
//! execution mode from cue words. No model involved; same input, same output.

use super::{Classifier, ClassifierInput};
use crate::error::{Error, Result};
use crate::routing::{Classification, ExecutionMode, Urgency};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("WORD_REGEX is a compile-time constant"));

const HIGH_URGENCY_CUES: &[&str] = &[
    "urgent", "asap", "immediately", "emergency", "missing", "now", "critical",
];
const LOW_URGENCY_CUES: &[&str] = &["report", "analytics", "trend", "trends", "summary", "history"];
const PARALLEL_CUES: &[&str] = &["parallel", "simultaneously", "both", "compare", "together"];
const CONDITIONAL_CUES: &[&str] = &["if", "unless", "only", "when"];

/// Keyword-matching classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    delimiter: String,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new("_")
    }
}

impl KeywordClassifier {
    /// Create a classifier splitting capability names on `delimiter`
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    fn capability_matches(&self, capability: &str, words: &HashSet<&str>) -> bool {
        let tokens: Vec<String> = capability
            .split(self.delimiter.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        if tokens.is_empty() {
            return false;
        }

        let hits = tokens
            .iter()
            .filter(|token| {
                words
                    .iter()
                    .any(|word| *word == token.as_str() || (token.len() >= 4 && word.starts_with(token.as_str())))
            })
            .count();

        // At least half of the tokens, rounded up
        hits * 2 >= tokens.len()
    }
}

fn any_cue(words: &HashSet<&str>, cues: &[&str]) -> bool {
    cues.iter().any(|cue| words.contains(cue))
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, input: &ClassifierInput) -> Result<Classification> {
        let lowered = input.message.to_lowercase();
        let words: HashSet<&str> = WORD_REGEX
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .collect();

        let matched: Vec<String> = input
            .capabilities
            .iter()
            .filter(|c| self.capability_matches(c, &words))
            .cloned()
            .collect();

        let Some(first) = matched.first() else {
            return Err(Error::Classification(
                "no capability matched the message".to_string(),
            ));
        };

        let domain = input
            .agents
            .iter()
            .find(|a| a.capabilities.iter().any(|c| c == first))
            .map(|a| a.domain.clone())
            .or_else(|| input.domains.first().cloned())
            .unwrap_or_default();

        let urgency = if any_cue(&words, HIGH_URGENCY_CUES) {
            Urgency::High
        } else if any_cue(&words, LOW_URGENCY_CUES) {
            Urgency::Low
        } else {
            Urgency::Medium
        };

        let execution_mode = if any_cue(&words, PARALLEL_CUES) {
            ExecutionMode::Parallel
        } else if any_cue(&words, CONDITIONAL_CUES) {
            ExecutionMode::Conditional
        } else {
            ExecutionMode::Sequential
        };

        debug!(
            capabilities = ?matched,
            domain = %domain,
            urgency = %urgency,
            execution_mode = %execution_mode,
            "Keyword classification"
        );

        Ok(Classification {
            domain,
            intent: format!("handle {}", matched.join(", ")),
            multi_agent: matched.len() > 1,
            capabilities: matched,
            urgency,
            execution_mode,
        })
    }
}
