//! Agent proxy
//!
//! One remote call to one agent, bounded by that agent's timeout, plus a
//! reachability probe. Breaker bookkeeping is not done here; the dispatcher's
//! retry wrapper owns it.

use crate::agent::{AgentDescriptor, AgentReply, AgentRequest};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for health probes, independent of the execution timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport to a remote agent
#[async_trait]
pub trait AgentProxy: Send + Sync {
    /// Send one request to the agent and return its reply
    async fn execute(&self, agent: &AgentDescriptor, request: &AgentRequest) -> Result<AgentReply>;

    /// Probe the agent's health endpoint.
    ///
    /// `Ok(true)` when it answered with success, `Ok(false)` when it answered
    /// otherwise, `Err` when it could not be reached.
    async fn probe(&self, agent: &AgentDescriptor) -> Result<bool>;
}

/// URL of an agent's execute endpoint
#[must_use]
pub fn execute_url(agent: &AgentDescriptor) -> String {
    format!("{}/execute", agent.url.trim_end_matches('/'))
}

/// URL of an agent's health endpoint
#[must_use]
pub fn health_url(agent: &AgentDescriptor) -> String {
    let path = &agent.health_check_path;
    if path.starts_with('/') {
        format!("{}{}", agent.url.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", agent.url.trim_end_matches('/'), path)
    }
}

/// Decode an agent's reply body
pub fn decode_reply(body: &[u8]) -> Result<AgentReply> {
    Ok(serde_json::from_slice(body)?)
}

/// HTTP/JSON agent proxy
#[derive(Debug, Clone)]
pub struct HttpAgentProxy {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl Default for HttpAgentProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAgentProxy {
    /// Create a proxy with a fresh connection pool
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a proxy on an existing client
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the probe timeout
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn transport_error(agent: &AgentDescriptor, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                agent: agent.name.clone(),
                secs: agent.timeout.as_secs(),
            }
        } else {
            Error::Network(format!("{}: {}", agent.name, err))
        }
    }
}

#[async_trait]
impl AgentProxy for HttpAgentProxy {
    async fn execute(&self, agent: &AgentDescriptor, request: &AgentRequest) -> Result<AgentReply> {
        let url = execute_url(agent);
        debug!(agent = %agent.name, url = %url, session_id = %request.session_id, "Calling agent");

        let response = self
            .client
            .post(&url)
            .timeout(agent.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_error(agent, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AgentStatus {
                agent: agent.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(agent, &e))?;
        decode_reply(&body).inspect_err(|e| {
            warn!(agent = %agent.name, error = %e, "Agent returned a malformed reply");
        })
    }

    async fn probe(&self, agent: &AgentDescriptor) -> Result<bool> {
        let url = health_url(agent);
        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => Ok(response.status() == reqwest::StatusCode::OK),
            Err(e) => {
                warn!(agent = %agent.name, url = %url, error = %e, "Health probe failed");
                Err(Self::transport_error(agent, &e))
            }
        }
    }
}
