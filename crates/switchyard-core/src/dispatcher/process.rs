//! Route pipeline
//!
//! Classify → Select → Execute → Aggregate. Business failures come back as a
//! `RoutingResult` with `success == false`; nothing here returns an error.

use crate::classifier::ClassifierInput;
use crate::routing::{Classification, RoutingRequest, RoutingResult};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::aggregate::aggregate;
use super::core::Dispatcher;
use super::types::Classified;

impl Dispatcher {
    /// Route one request to agents and aggregate their answers
    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn route(&self, request: RoutingRequest) -> RoutingResult {
        let start = Instant::now();

        self.touch_session(&request).await;

        let classified = self.classify(request).await;
        let selected = self.select(classified).await;
        let executed = self.execute(selected).await;
        let result = aggregate(&executed.classification, &executed.results, executed.fallback_used);

        info!(
            success = result.success,
            agents = ?executed.agents,
            mode = %result.execution_mode,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Routing complete"
        );
        result
    }

    /// Create the session when absent, otherwise extend its TTL
    async fn touch_session(&self, request: &RoutingRequest) {
        let outcome = match self.store.get(&request.session_id).await {
            Ok(Some(_)) => self.store.extend_ttl(&request.session_id).await.map(|_| ()),
            Ok(None) => self
                .store
                .create(&request.session_id, &request.user_id)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!(session_id = %request.session_id, error = %e, "Session store unavailable");
        }
    }

    /// Classify stage; any classifier failure yields the default classification
    pub(super) async fn classify(&self, request: RoutingRequest) -> Classified {
        let input = ClassifierInput {
            message: request.message.clone(),
            domains: self.directory.list_domains().await,
            capabilities: self.directory.list_capabilities().await,
            agents: self.directory.summaries().await,
        };

        let classification = match self.classifier.classify(&input).await {
            Ok(classification) => {
                debug!(
                    domain = %classification.domain,
                    capabilities = ?classification.capabilities,
                    mode = %classification.execution_mode,
                    "Request classified"
                );
                classification
            }
            Err(e) => {
                warn!(error = %e, "Classification failed, using default classification");
                Classification::fallback(
                    self.config.default_domain.as_str(),
                    self.config.default_capability.as_str(),
                )
            }
        };

        Classified {
            request,
            classification,
        }
    }
}
