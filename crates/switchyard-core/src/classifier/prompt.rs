//! Model-backed classifier
//!
//! Builds a classification prompt from the directory catalogs, sends it to a
//! [`CompletionBackend`] and parses the JSON answer.

use super::{Classifier, ClassifierInput};
use crate::error::{Error, Result};
use crate::routing::Classification;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are an intent classifier for a multi-agent dispatcher. \
Answer with a single JSON object and nothing else.";

/// Text completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete a prompt, returning raw model text
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Classifier that asks a completion backend
pub struct PromptClassifier {
    backend: Arc<dyn CompletionBackend>,
    default_domain: String,
}

impl PromptClassifier {
    /// Create a classifier; `default_domain` fills answers without a domain
    pub fn new(backend: Arc<dyn CompletionBackend>, default_domain: impl Into<String>) -> Self {
        Self {
            backend,
            default_domain: default_domain.into(),
        }
    }
}

/// Render the user prompt for one request
#[must_use]
pub fn build_prompt(input: &ClassifierInput) -> String {
    let agents = serde_json::to_string_pretty(&input.agents).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze this request and decide which agents should handle it.\n\n\
         Request: \"{message}\"\n\n\
         Available domains: {domains}\n\
         Available capabilities: {capabilities}\n\n\
         Agents:\n{agents}\n\n\
         Respond with JSON of this shape:\n\
         {{\n\
         \x20 \"domain\": \"one of the available domains\",\n\
         \x20 \"intent\": \"short description of what the user wants\",\n\
         \x20 \"required_capabilities\": [\"capabilities in the order they should run\"],\n\
         \x20 \"urgency\": \"high | medium | low\",\n\
         \x20 \"multi_agent\": true,\n\
         \x20 \"execution_mode\": \"sequential | parallel | conditional\",\n\
         \x20 \"reasoning\": \"one sentence on why these agents\"\n\
         }}",
        message = input.message,
        domains = input.domains.join(", "),
        capabilities = input.capabilities.join(", "),
        agents = agents,
    )
}

/// Pull the JSON body out of a model answer, fenced or not
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let body = &trimmed[start + fence.len()..];
            let end = body.find("```").unwrap_or(body.len());
            return body[..end].trim();
        }
    }
    trimmed
}

/// Parse a model answer into a classification.
///
/// Missing fields take their defaults; a missing or empty domain becomes
/// `default_domain`. A field with an unusable value (null, wrong type, unknown
/// variant) falls back to its own default instead of failing the answer.
pub fn parse_classification(text: &str, default_domain: &str) -> Result<Classification> {
    parse_answer(text, default_domain).map(|(classification, _)| classification)
}

/// Parse a model answer, also returning the model's `reasoning` when given
fn parse_answer(text: &str, default_domain: &str) -> Result<(Classification, Option<String>)> {
    let body = extract_json(text);
    if body.is_empty() {
        return Err(Error::Classification("empty classifier answer".to_string()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Classification(format!("answer is not JSON: {}", e)))?;
    let mut object = match value {
        Value::Object(map) => map,
        other => {
            return Err(Error::Classification(format!(
                "expected a JSON object, got {}",
                other
            )))
        }
    };

    let has_domain = object
        .get("domain")
        .and_then(|d| d.as_str())
        .is_some_and(|d| !d.trim().is_empty());
    if !has_domain {
        object.insert(
            "domain".to_string(),
            Value::String(default_domain.to_string()),
        );
    }

    normalize_variant(&mut object, "urgency", &["high", "medium", "low"]);
    normalize_variant(
        &mut object,
        "execution_mode",
        &["sequential", "parallel", "conditional"],
    );
    normalize_flag(&mut object, "multi_agent");
    for key in ["intent", "capabilities", "required_capabilities"] {
        if object.get(key).is_some_and(Value::is_null) {
            object.remove(key);
        }
    }

    let reasoning = object
        .remove("reasoning")
        .and_then(|r| r.as_str().map(str::to_string));

    let classification = serde_json::from_value(Value::Object(object))
        .map_err(|e| Error::Classification(format!("malformed classification: {}", e)))?;
    Ok((classification, reasoning))
}

/// Lowercase a string field; drop it when it is not one of `allowed`
fn normalize_variant(object: &mut Map<String, Value>, key: &str, allowed: &[&str]) {
    let normalized = object
        .get(key)
        .and_then(Value::as_str)
        .map(|v| v.trim().to_lowercase())
        .filter(|v| allowed.contains(&v.as_str()));

    match normalized {
        Some(v) => {
            object.insert(key.to_string(), Value::String(v));
        }
        None => {
            if let Some(dropped) = object.remove(key) {
                debug!(field = key, value = %dropped, "Ignoring unusable classifier field");
            }
        }
    }
}

/// Accept `true`/`false` as booleans or strings; drop anything else
fn normalize_flag(object: &mut Map<String, Value>, key: &str) {
    let flag = match object.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => s.trim().to_lowercase().parse::<bool>().ok(),
        _ => None,
    };

    match flag {
        Some(b) => {
            object.insert(key.to_string(), Value::Bool(b));
        }
        None => {
            object.remove(key);
        }
    }
}

#[async_trait]
impl Classifier for PromptClassifier {
    async fn classify(&self, input: &ClassifierInput) -> Result<Classification> {
        let prompt = build_prompt(input);
        let answer = self.backend.complete(SYSTEM_PROMPT, &prompt).await?;
        debug!(answer_len = answer.len(), "Classifier answer received");

        let (classification, reasoning) = parse_answer(&answer, &self.default_domain)
            .inspect_err(|e| {
                warn!(error = %e, "Could not parse classifier answer");
            })?;
        debug!(
            domain = %classification.domain,
            capabilities = ?classification.capabilities,
            reasoning = reasoning.as_deref().unwrap_or(""),
            "Model classification"
        );
        Ok(classification)
    }
}
