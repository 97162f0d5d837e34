//! Scripted collaborators shared by unit tests.

use crate::agent::{AgentDescriptor, AgentReply, AgentRequest, ContextMap, HealthStatus};
use crate::error::{Error, Result};
use crate::proxy::AgentProxy;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Step {
    Reply(AgentReply),
    Fail(String),
    Panic,
    Slow(Duration, AgentReply),
}

#[derive(Default)]
pub struct ScriptedProxy {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    probes: Mutex<HashMap<String, Option<bool>>>,
    calls: Mutex<Vec<(String, AgentRequest)>>,
}

impl ScriptedProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue steps for an agent; once drained the agent echoes success
    pub fn script(self, agent: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(agent.to_string())
            .or_default()
            .extend(steps);
        self
    }

    /// Probe answer: Some(true) healthy, Some(false) degraded, None unreachable
    pub fn probe_answer(self, agent: &str, answer: Option<bool>) -> Self {
        self.probes.lock().unwrap().insert(agent.to_string(), answer);
        self
    }

    pub fn calls(&self) -> Vec<(String, AgentRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_agents(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl AgentProxy for ScriptedProxy {
    async fn execute(&self, agent: &AgentDescriptor, request: &AgentRequest) -> Result<AgentReply> {
        self.calls
            .lock()
            .unwrap()
            .push((agent.name.clone(), request.clone()));

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&agent.name)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(msg)) => Err(Error::Network(msg)),
            Some(Step::Panic) => panic!("agent {} blew up", agent.name),
            Some(Step::Slow(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            None => Ok(AgentReply::ok(format!("{} done", agent.name))),
        }
    }

    async fn probe(&self, agent: &AgentDescriptor) -> Result<bool> {
        match self.probes.lock().unwrap().get(&agent.name).copied() {
            Some(Some(ok)) => Ok(ok),
            Some(None) => Err(Error::Network("connection refused".to_string())),
            None => Ok(true),
        }
    }
}

pub fn healthy(name: &str, domain: &str, capabilities: &[&str]) -> AgentDescriptor {
    AgentDescriptor::new(
        name,
        domain,
        format!("http://{}.test", name),
        capabilities.iter().copied(),
    )
    .with_health(HealthStatus::Healthy)
    .with_retry_count(0)
}

pub fn payload(key: &str, value: &str) -> ContextMap {
    let mut map = ContextMap::new();
    map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    map
}
