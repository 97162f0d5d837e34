//! Session store
//!
//! Key-value contract the dispatcher uses for conversation continuity, and an
//! in-memory implementation with TTL expiry.
//!
//! `MemorySessionStore` keeps everything in process memory; data is lost on
//! restart. Conversation history is kept apart from the session record and
//! survives session expiry or deletion; each session keeps only its newest
//! `history_limit` turns.

use crate::agent::ContextMap;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Turns kept per session by default
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Per-session state shared across agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Session ID
    pub session_id: String,
    /// Owner user ID
    pub user_id: String,
    /// Agents that handled this session, in call order
    pub agent_chain: Vec<String>,
    /// Accumulated context variables
    pub context_variables: ContextMap,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    /// Create an empty session
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            agent_chain: Vec::new(),
            context_variables: ContextMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One conversation turn handled by one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Session ID
    pub session_id: String,
    /// User ID
    pub user_id: String,
    /// Agent that answered
    pub agent_name: String,
    /// What the user asked
    pub user_message: String,
    /// What the agent answered
    pub agent_response: String,
    /// Agent metadata
    pub metadata: ContextMap,
    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

/// Session store contract
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create (or overwrite) a session
    async fn create(&self, session_id: &str, user_id: &str) -> Result<SessionContext>;

    /// Get a live session
    async fn get(&self, session_id: &str) -> Result<Option<SessionContext>>;

    /// Append an agent to the chain and merge variables.
    ///
    /// Returns `None` when the session does not exist.
    async fn update(
        &self,
        session_id: &str,
        agent_name: Option<&str>,
        variables: Option<ContextMap>,
    ) -> Result<Option<SessionContext>>;

    /// Record a conversation turn
    async fn append_history(&self, record: HistoryRecord) -> Result<()>;

    /// Newest `limit` turns of a session, oldest first
    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Delete a session; returns whether it existed
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Push a session's expiry out by the store's TTL
    async fn extend_ttl(&self, session_id: &str) -> Result<bool>;
}

#[derive(Debug)]
struct StoredSession {
    context: SessionContext,
    expires_at: Instant,
}

/// In-memory session store
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    history: RwLock<HashMap<String, Vec<HistoryRecord>>>,
    ttl: Duration,
    history_limit: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl MemorySessionStore {
    /// Create a store whose sessions expire `ttl` after their last write
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            ttl,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` turns per session (minimum 1)
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Turns kept per session
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Session TTL
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop expired sessions; returns how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed = removed, "Expired sessions removed");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session_id: &str, user_id: &str) -> Result<SessionContext> {
        let context = SessionContext::new(session_id, user_id);
        self.sessions.write().await.insert(
            session_id.to_string(),
            StoredSession {
                context: context.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        info!(session_id = %session_id, user_id = %user_id, "Session created");
        Ok(context)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionContext>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let found = sessions
            .get(session_id)
            .map(|stored| (stored.expires_at > now, stored.context.clone()));

        match found {
            Some((true, context)) => {
                debug!(session_id = %session_id, "Session retrieved");
                Ok(Some(context))
            }
            Some((false, _)) => {
                sessions.remove(session_id);
                debug!(session_id = %session_id, "Session expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        session_id: &str,
        agent_name: Option<&str>,
        variables: Option<ContextMap>,
    ) -> Result<Option<SessionContext>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(session_id).filter(|s| s.expires_at > now) else {
            warn!(session_id = %session_id, "Session not found for update");
            return Ok(None);
        };

        if let Some(agent) = agent_name {
            stored.context.agent_chain.push(agent.to_string());
        }
        if let Some(vars) = variables {
            stored.context.context_variables.extend(vars);
        }
        stored.context.updated_at = Utc::now();
        stored.expires_at = now + self.ttl;

        debug!(session_id = %session_id, agent = ?agent_name, "Session updated");
        Ok(Some(stored.context.clone()))
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        debug!(
            session_id = %record.session_id,
            agent = %record.agent_name,
            "Conversation saved"
        );
        let mut history = self.history.write().await;
        let records = history.entry(record.session_id.clone()).or_default();
        records.push(record);
        if records.len() > self.history_limit {
            let excess = records.len() - self.history_limit;
            records.drain(..excess);
        }
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let history = self.history.read().await;
        let records = history.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = records.len().saturating_sub(limit);
        Ok(records[start..].to_vec())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "Session deleted");
        }
        Ok(removed)
    }

    async fn extend_ttl(&self, session_id: &str) -> Result<bool> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id).filter(|s| s.expires_at > now) {
            Some(stored) => {
                stored.expires_at = now + self.ttl;
                debug!(session_id = %session_id, "Session TTL extended");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
