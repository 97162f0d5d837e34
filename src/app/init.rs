//! Application initialization
//!
//! Turns a loaded `AppConfig` into a ready directory, proxy and dispatcher.

use super::completion::ChatCompletionBackend;
use super::config::{AppConfig, ClassifierBackend};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{
    descriptors_from_catalog, AgentDirectory, Classifier, Dispatcher, HealthStatus,
    HttpAgentProxy, KeywordClassifier, MemorySessionStore, PromptClassifier,
};
use tracing::{info, warn};

/// Wired application components
pub struct App {
    pub config: AppConfig,
    pub directory: Arc<AgentDirectory>,
    pub proxy: Arc<HttpAgentProxy>,
    pub store: Arc<MemorySessionStore>,
    pub dispatcher: Dispatcher,
}

/// Validate configuration and build every component
pub async fn build_app(config: AppConfig) -> Result<App> {
    config
        .dispatcher
        .validate()
        .context("Invalid dispatcher configuration")?;

    let initial_health = if config.assume_healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unavailable
    };
    let descriptors = descriptors_from_catalog(&config.agents, initial_health)
        .context("Invalid agent catalog")?;
    if descriptors.is_empty() {
        warn!("Agent catalog is empty; every request will report no agent available");
    }

    let directory = Arc::new(AgentDirectory::with_agents(descriptors).await);
    let proxy = Arc::new(HttpAgentProxy::new());
    let store = Arc::new(
        MemorySessionStore::new(config.session.ttl())
            .with_history_limit(config.session.history_limit),
    );
    let classifier = build_classifier(&config)?;

    let dispatcher = Dispatcher::new(
        config.dispatcher.clone(),
        Arc::clone(&directory),
        classifier,
        proxy.clone(),
    )
    .with_session_store(store.clone());

    let stats = directory.stats().await;
    info!(
        agents = stats.total_agents,
        domains = stats.domains,
        capabilities = stats.capabilities,
        "Agent directory loaded"
    );

    Ok(App {
        config,
        directory,
        proxy,
        store,
        dispatcher,
    })
}

fn build_classifier(config: &AppConfig) -> Result<Arc<dyn Classifier>> {
    let settings = &config.classifier;
    match settings.backend {
        ClassifierBackend::Keyword => {
            info!("Using keyword classifier");
            Ok(Arc::new(KeywordClassifier::new(
                config.dispatcher.capability_delimiter.clone(),
            )))
        }
        ClassifierBackend::Prompt => {
            let api_key = std::env::var(&settings.api_key_env).with_context(|| {
                format!(
                    "{} must be set when classifier.backend = \"prompt\"",
                    settings.api_key_env
                )
            })?;
            let backend = ChatCompletionBackend::new(
                settings.base_url.clone(),
                settings.model.clone(),
                api_key,
                Duration::from_secs(settings.timeout_secs),
            )?;
            info!(model = %settings.model, "Using prompt classifier");
            Ok(Arc::new(PromptClassifier::new(
                Arc::new(backend),
                config.dispatcher.default_domain.clone(),
            )))
        }
    }
}
