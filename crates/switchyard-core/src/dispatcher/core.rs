//! Dispatcher core structure

use crate::breaker::{BreakerTracker, RoutingStats};
use crate::classifier::Classifier;
use crate::config::DispatcherConfig;
use crate::directory::AgentDirectory;
use crate::proxy::AgentProxy;
use crate::session::{MemorySessionStore, SessionStore};
use std::sync::Arc;

use super::invoke::Invoker;

/// Routes requests to agents
pub struct Dispatcher {
    pub(crate) config: DispatcherConfig,
    pub(crate) directory: Arc<AgentDirectory>,
    pub(crate) classifier: Arc<dyn Classifier>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) tracker: Arc<BreakerTracker>,
    pub(crate) invoker: Invoker,
}

impl Dispatcher {
    /// Create a dispatcher with its own tracker and an in-memory session store
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        directory: Arc<AgentDirectory>,
        classifier: Arc<dyn Classifier>,
        proxy: Arc<dyn AgentProxy>,
    ) -> Self {
        let tracker = Arc::new(BreakerTracker::new(config.breaker_threshold));
        let invoker = Invoker::new(proxy, Arc::clone(&tracker), config.backoff_unit());

        Self {
            config,
            directory,
            classifier,
            store: Arc::new(MemorySessionStore::default()),
            tracker,
            invoker,
        }
    }

    /// Set the session store
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Share a breaker tracker (e.g. between dispatchers)
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<BreakerTracker>) -> Self {
        self.invoker = self.invoker.with_tracker(Arc::clone(&tracker));
        self.tracker = tracker;
        self
    }

    /// Dispatcher settings
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The agent directory
    #[must_use]
    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    /// The breaker tracker
    #[must_use]
    pub fn tracker(&self) -> &Arc<BreakerTracker> {
        &self.tracker
    }

    /// The session store
    #[must_use]
    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Failure counts, load counters and open breakers
    #[must_use]
    pub fn routing_stats(&self) -> RoutingStats {
        self.tracker.stats()
    }

    /// Close one agent's breaker
    pub fn reset_breaker(&self, agent: &str) {
        self.tracker.reset(agent);
    }

    /// Close every breaker
    pub fn reset_all_breakers(&self) {
        self.tracker.reset_all();
    }
}
