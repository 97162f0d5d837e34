use super::*;
use crate::agent::{AgentCallResult, AgentDescriptor, AgentReply, ContextMap, HealthStatus};
use crate::breaker::BreakerTracker;
use crate::classifier::{Classifier, ClassifierInput};
use crate::config::DispatcherConfig;
use crate::directory::AgentDirectory;
use crate::error::{Error, Result};
use crate::routing::{
    Classification, ExecutionMode, RoutingFailure, RoutingRequest, RoutingResult, Urgency,
};
use crate::session::{HistoryRecord, MemorySessionStore, SessionContext, SessionStore};
use crate::testing::{healthy, payload, ScriptedProxy, Step};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct FixedClassifier(Classification);

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _input: &ClassifierInput) -> Result<Classification> {
        Ok(self.0.clone())
    }
}

struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _input: &ClassifierInput) -> Result<Classification> {
        Err(Error::Classification("model returned prose".to_string()))
    }
}

/// Store whose every call fails
struct BrokenStore;

#[async_trait]
impl SessionStore for BrokenStore {
    async fn create(&self, _: &str, _: &str) -> Result<SessionContext> {
        Err(Error::Store("down".to_string()))
    }
    async fn get(&self, _: &str) -> Result<Option<SessionContext>> {
        Err(Error::Store("down".to_string()))
    }
    async fn update(
        &self,
        _: &str,
        _: Option<&str>,
        _: Option<ContextMap>,
    ) -> Result<Option<SessionContext>> {
        Err(Error::Store("down".to_string()))
    }
    async fn append_history(&self, _: HistoryRecord) -> Result<()> {
        Err(Error::Store("down".to_string()))
    }
    async fn get_history(&self, _: &str, _: usize) -> Result<Vec<HistoryRecord>> {
        Err(Error::Store("down".to_string()))
    }
    async fn delete(&self, _: &str) -> Result<bool> {
        Err(Error::Store("down".to_string()))
    }
    async fn extend_ttl(&self, _: &str) -> Result<bool> {
        Err(Error::Store("down".to_string()))
    }
}

fn plan(capabilities: &[&str], mode: ExecutionMode) -> Classification {
    Classification {
        domain: "baggage".to_string(),
        intent: "locate bag".to_string(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        urgency: Urgency::High,
        multi_agent: capabilities.len() > 1,
        execution_mode: mode,
    }
}

fn config() -> DispatcherConfig {
    DispatcherConfig {
        default_domain: "baggage".to_string(),
        default_capability: "track".to_string(),
        ..DispatcherConfig::default()
    }
}

fn request() -> RoutingRequest {
    RoutingRequest::new("s1", "u1", "Where is my bag?")
}

struct Harness {
    dispatcher: Dispatcher,
    proxy: Arc<ScriptedProxy>,
    store: Arc<MemorySessionStore>,
}

async fn harness(
    agents: Vec<AgentDescriptor>,
    classifier: impl Classifier + 'static,
    proxy: ScriptedProxy,
) -> Harness {
    let directory = Arc::new(AgentDirectory::with_agents(agents).await);
    let proxy = Arc::new(proxy);
    let store = Arc::new(MemorySessionStore::default());
    let dispatcher = Dispatcher::new(config(), directory, Arc::new(classifier), proxy.clone())
        .with_session_store(store.clone());
    Harness {
        dispatcher,
        proxy,
        store,
    }
}

fn baggage_agents() -> Vec<AgentDescriptor> {
    vec![
        healthy("tracker", "baggage", &["track"]),
        healthy("riskbot", "baggage", &["risk_analysis"]),
        healthy("notifier", "baggage", &["notify"]),
    ]
}

fn bag_payload() -> ContextMap {
    let mut data = ContextMap::new();
    data.insert("bag".to_string(), json!("X"));
    data
}

#[tokio::test]
async fn test_sequential_threads_context_and_builds_chain() {
    let proxy = ScriptedProxy::new().script(
        "tracker",
        [Step::Reply(
            AgentReply::ok("bag is in Tokyo").with_data(bag_payload()),
        )],
    );
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track", "risk_analysis"], ExecutionMode::Sequential)),
        proxy,
    )
    .await;

    let result = h.dispatcher.route(request()).await;

    assert!(result.success);
    assert_eq!(
        result.execution_chain(),
        Some(&["tracker".to_string(), "riskbot".to_string()][..])
    );
    let tracker_at = result.message.find("bag is in Tokyo").unwrap();
    let riskbot_at = result.message.find("riskbot done").unwrap();
    assert!(tracker_at < riskbot_at);
    assert!(result.message.contains(" → "));
    assert_eq!(result.data["tracker"]["bag"], "X");

    let calls = h.proxy.calls();
    assert_eq!(h.proxy.called_agents(), vec!["tracker", "riskbot"]);
    assert!(calls[0].1.context.get(&context_key("tracker")).is_none());
    assert_eq!(calls[1].1.context["tracker_output"], json!({ "bag": "X" }));
}

#[tokio::test]
async fn test_sequential_attempts_every_agent() {
    let proxy = ScriptedProxy::new().script("riskbot", [Step::Reply(AgentReply::failed("no data"))]);
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(
            &["track", "risk_analysis", "notify"],
            ExecutionMode::Sequential,
        )),
        proxy,
    )
    .await;

    let result = h.dispatcher.route(request()).await;

    assert_eq!(h.proxy.called_agents(), vec!["tracker", "riskbot", "notifier"]);
    assert_eq!(result.total_agents_attempted, 3);
    assert_eq!(result.successful_agents, 2);
    assert_eq!(
        result.execution_chain(),
        Some(&["tracker".to_string(), "notifier".to_string()][..])
    );
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_sequential_order_follows_capability_order() {
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(
            &["notify", "risk_analysis", "track"],
            ExecutionMode::Sequential,
        )),
        ScriptedProxy::new(),
    )
    .await;

    let result = h.dispatcher.route(request()).await;
    assert_eq!(h.proxy.called_agents(), vec!["notifier", "riskbot", "tracker"]);
    assert_eq!(result.agents_used, vec!["notifier", "riskbot", "tracker"]);
}

#[tokio::test]
async fn test_conditional_stops_after_first_failure() {
    let proxy = ScriptedProxy::new().script("riskbot", [Step::Fail("connection reset".to_string())]);
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(
            &["track", "risk_analysis", "notify"],
            ExecutionMode::Conditional,
        )),
        proxy,
    )
    .await;

    let result = h.dispatcher.route(request()).await;

    assert_eq!(h.proxy.called_agents(), vec!["tracker", "riskbot"]);
    assert_eq!(result.total_agents_attempted, 2);
    assert!(result.success);
    assert_eq!(result.execution_mode, ExecutionMode::Conditional);
    assert_eq!(
        result.execution_chain(),
        Some(&["tracker".to_string()][..])
    );
}

#[tokio::test]
async fn test_conditional_runs_everything_without_failures() {
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(
            &["track", "risk_analysis", "notify"],
            ExecutionMode::Conditional,
        )),
        ScriptedProxy::new(),
    )
    .await;

    let result = h.dispatcher.route(request()).await;
    assert_eq!(result.total_agents_attempted, 3);
    assert_eq!(result.successful_agents, 3);
}

#[tokio::test]
async fn test_parallel_failure_does_not_abort_request() {
    let proxy = ScriptedProxy::new()
        .script("tracker", [Step::Reply(AgentReply::ok("found").with_data(bag_payload()))])
        .script("riskbot", [Step::Panic]);
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track", "risk_analysis"], ExecutionMode::Parallel)),
        proxy,
    )
    .await;

    let req = request().with_context(payload("flight", "NH459"));
    let result = h.dispatcher.route(req).await;

    assert!(result.success);
    assert_eq!(result.contributors(), Some(&["tracker".to_string()][..]));
    assert!(result.execution_chain().is_none());
    assert_eq!(result.total_agents_attempted, 2);
    assert_eq!(result.successful_agents, 1);
    assert!(result.errors[0].contains("aborted"));
    assert!(result.message.starts_with("Combined results:\n"));
    assert!(result.message.contains("• tracker: found"));

    // Both agents saw the caller's context and nothing else
    for (_, sent) in h.proxy.calls() {
        assert_eq!(sent.context, payload("flight", "NH459"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_parallel_calls_overlap() {
    let slow = |msg: &str| Step::Slow(Duration::from_secs(5), AgentReply::ok(msg));
    let proxy = ScriptedProxy::new()
        .script("tracker", [slow("one")])
        .script("riskbot", [slow("two")]);
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track", "risk_analysis"], ExecutionMode::Parallel)),
        proxy,
    )
    .await;

    let start = Instant::now();
    let result = h.dispatcher.route(request()).await;

    assert_eq!(result.successful_agents, 2);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_retry_backs_off_and_closes_breaker() {
    let agents = vec![healthy("tracker", "baggage", &["track"]).with_retry_count(3)];
    let proxy = ScriptedProxy::new().script(
        "tracker",
        [
            Step::Fail("timeout".to_string()),
            Step::Reply(AgentReply::failed("busy")),
            Step::Reply(AgentReply::ok("found")),
        ],
    );
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        proxy,
    )
    .await;

    let start = Instant::now();
    let result = h.dispatcher.route(request()).await;
    let elapsed = start.elapsed();

    assert!(result.success);
    assert_eq!(h.proxy.calls().len(), 3);
    // 1 + 2 backoff units
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(4));
    assert_eq!(h.dispatcher.tracker().failure_count("tracker"), 0);
}

#[tokio::test]
async fn test_exhausted_retries_report_attempts_and_last_error() {
    let agents = vec![healthy("tracker", "baggage", &["track"]).with_retry_count(0)];
    let proxy = ScriptedProxy::new().script("tracker", [Step::Fail("connection refused".to_string())]);
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        proxy,
    )
    .await;

    let result = h.dispatcher.route(request()).await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(RoutingFailure::AllAgentsFailed));
    assert_eq!(result.message, "All agents failed to process request");
    assert_eq!(result.agents_used, vec!["tracker"]);
    assert!(result.errors[0].contains("Failed after 1 attempts"));
    assert!(result.errors[0].contains("connection refused"));
    assert_eq!(h.dispatcher.tracker().failure_count("tracker"), 1);
}

#[tokio::test]
async fn test_breaker_excludes_agent_until_reset() {
    let agents = vec![healthy("tracker", "baggage", &["track"])];
    let proxy = ScriptedProxy::new().script(
        "tracker",
        (0..3).map(|_| Step::Reply(AgentReply::failed("down"))),
    );
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        proxy,
    )
    .await;

    for _ in 0..3 {
        let result = h.dispatcher.route(request()).await;
        assert_eq!(result.failure, Some(RoutingFailure::AllAgentsFailed));
    }
    assert_eq!(
        h.dispatcher.routing_stats().circuit_breakers_open,
        vec!["tracker"]
    );

    let blocked = h.dispatcher.route(request()).await;
    assert_eq!(blocked.failure, Some(RoutingFailure::NoAgentAvailable));
    assert_eq!(blocked.message, "No agents available to handle this request");
    assert_eq!(h.proxy.calls().len(), 3);

    h.dispatcher.reset_breaker("tracker");
    let recovered = h.dispatcher.route(request()).await;
    assert!(recovered.success);
    assert_eq!(h.proxy.calls().len(), 4);
}

#[tokio::test]
async fn test_selection_skips_unhealthy_and_open_agents() {
    let agents = vec![
        healthy("spare", "baggage", &["track"]).with_health(HealthStatus::Degraded),
        healthy("flaky", "baggage", &["track"]),
        healthy("tracker", "baggage", &["track"]),
    ];
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        ScriptedProxy::new(),
    )
    .await;
    for _ in 0..3 {
        h.dispatcher.tracker().record_failure("flaky");
    }

    for _ in 0..3 {
        let result = h.dispatcher.route(request()).await;
        assert_eq!(result.agents_used, vec!["tracker"]);
    }
    assert_eq!(h.proxy.called_agents(), vec!["tracker", "tracker", "tracker"]);
}

#[tokio::test]
async fn test_equal_candidates_are_balanced() {
    let agents = vec![
        healthy("tracker-a", "baggage", &["track"]),
        healthy("tracker-b", "baggage", &["track"]),
        healthy("tracker-c", "baggage", &["track"]),
    ];
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        ScriptedProxy::new(),
    )
    .await;

    for _ in 0..3 {
        h.dispatcher.route(request()).await;
    }
    assert_eq!(
        h.proxy.called_agents(),
        vec!["tracker-a", "tracker-b", "tracker-c"]
    );
    let stats = h.dispatcher.routing_stats();
    assert!(stats.agent_load_counter.values().all(|load| *load == 1));
}

#[tokio::test]
async fn test_semantic_fallback_matches_similar_capability() {
    let agents = vec![
        healthy("tracker", "baggage", &["track"]),
        healthy("riskbot", "baggage", &["connection_risk_analysis"]),
    ];
    let h = harness(
        agents,
        FixedClassifier(plan(
            &["connection_risk_analysis_report"],
            ExecutionMode::Sequential,
        )),
        ScriptedProxy::new(),
    )
    .await;

    let result = h.dispatcher.route(request()).await;
    assert!(result.success);
    assert!(!result.fallback_used);
    assert_eq!(result.agents_used, vec!["riskbot"]);
}

#[tokio::test]
async fn test_domain_fallback_picks_first_eligible_agent() {
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["teleport"], ExecutionMode::Sequential)),
        ScriptedProxy::new(),
    )
    .await;
    h.dispatcher.tracker().record_failure("tracker");
    h.dispatcher.tracker().record_failure("tracker");
    h.dispatcher.tracker().record_failure("tracker");

    let result = h.dispatcher.route(request()).await;

    assert!(result.success);
    assert!(result.fallback_used);
    assert_eq!(result.agents_used, vec!["riskbot"]);
    // Fallback does not count as a balanced pick
    assert_eq!(h.dispatcher.tracker().load_count("riskbot"), 0);
}

#[tokio::test]
async fn test_no_healthy_agents_is_reported_not_raised() {
    let agents = vec![
        healthy("tracker", "baggage", &["track"]).with_health(HealthStatus::Unavailable),
    ];
    let h = harness(
        agents,
        FixedClassifier(plan(&["track"], ExecutionMode::Parallel)),
        ScriptedProxy::new(),
    )
    .await;

    let result = h.dispatcher.route(request()).await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(RoutingFailure::NoAgentAvailable));
    assert_eq!(result.total_agents_attempted, 0);
    assert!(result.agents_used.is_empty());
    assert!(h.proxy.calls().is_empty());
}

#[tokio::test]
async fn test_classifier_failure_uses_default_classification() {
    let h = harness(baggage_agents(), FailingClassifier, ScriptedProxy::new()).await;

    let result = h.dispatcher.route(request()).await;

    assert!(result.success);
    assert_eq!(result.agents_used, vec!["tracker"]);
    assert_eq!(result.urgency, Urgency::Medium);
    assert_eq!(result.execution_mode, ExecutionMode::Sequential);
}

#[tokio::test]
async fn test_requests_carry_routing_metadata() {
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track"], ExecutionMode::Sequential)),
        ScriptedProxy::new(),
    )
    .await;

    h.dispatcher.route(request()).await;

    let (_, sent) = &h.proxy.calls()[0];
    assert_eq!(sent.session_id, "s1");
    assert_eq!(sent.user_id, "u1");
    assert_eq!(sent.metadata["intent"], "locate bag");
    assert_eq!(sent.metadata["urgency"], "high");
    assert_eq!(sent.metadata["execution_mode"], "sequential");
}

#[tokio::test]
async fn test_steps_are_recorded_in_session_store() {
    let proxy = ScriptedProxy::new().script(
        "tracker",
        [Step::Reply(AgentReply::ok("found").with_data(bag_payload()))],
    );
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track", "risk_analysis"], ExecutionMode::Sequential)),
        proxy,
    )
    .await;

    h.dispatcher.route(request()).await;

    let session = h.store.get("s1").await.unwrap().unwrap();
    assert_eq!(session.user_id, "u1");
    assert_eq!(session.agent_chain, vec!["tracker", "riskbot"]);
    assert_eq!(session.context_variables["tracker_output"]["bag"], "X");

    let history = h.store.get_history("s1", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].agent_response, "found");
    assert_eq!(history[1].agent_name, "riskbot");
}

#[tokio::test]
async fn test_parallel_steps_are_recorded_without_context_variables() {
    let proxy = ScriptedProxy::new()
        .script("tracker", [Step::Reply(AgentReply::ok("found").with_data(bag_payload()))])
        .script("riskbot", [Step::Fail("gateway down".to_string())]);
    let h = harness(
        baggage_agents(),
        FixedClassifier(plan(&["track", "risk_analysis"], ExecutionMode::Parallel)),
        proxy,
    )
    .await;

    let result = h.dispatcher.route(request()).await;
    assert!(result.success);
    assert_eq!(result.successful_agents, 1);

    let session = h.store.get("s1").await.unwrap().unwrap();
    assert_eq!(session.agent_chain, vec!["tracker", "riskbot"]);
    assert!(session.context_variables.is_empty());

    let history = h.store.get_history("s1", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].agent_name, "tracker");
    assert_eq!(history[0].agent_response, "found");
    assert_eq!(history[1].agent_name, "riskbot");
    assert!(history[1].agent_response.contains("gateway down"));
}

#[tokio::test]
async fn test_store_failures_do_not_abort_routing() {
    let directory = Arc::new(AgentDirectory::with_agents(baggage_agents()).await);
    let dispatcher = Dispatcher::new(
        config(),
        directory,
        Arc::new(FixedClassifier(plan(&["track"], ExecutionMode::Parallel))),
        Arc::new(ScriptedProxy::new()),
    )
    .with_session_store(Arc::new(BrokenStore));

    let result = dispatcher.route(request()).await;
    assert!(result.success);
}

#[tokio::test]
async fn test_shared_tracker_is_consulted() {
    let tracker = Arc::new(BreakerTracker::new(1));
    tracker.record_failure("tracker");

    let directory = Arc::new(AgentDirectory::with_agents(baggage_agents()).await);
    let dispatcher = Dispatcher::new(
        config(),
        directory,
        Arc::new(FixedClassifier(plan(&["track"], ExecutionMode::Sequential))),
        Arc::new(ScriptedProxy::new()),
    )
    .with_tracker(Arc::clone(&tracker));

    let blocked = dispatcher.route(request()).await;
    assert!(blocked.fallback_used);
    assert_eq!(blocked.agents_used, vec!["riskbot"]);

    dispatcher.reset_all_breakers();
    assert!(!tracker.is_open("tracker"));
    let result = dispatcher.route(request()).await;
    assert_eq!(result.agents_used, vec!["tracker"]);
}

#[test]
fn test_capability_similarity() {
    assert_eq!(capability_similarity("risk_analysis", "risk_analysis", "_"), 1.0);
    assert_eq!(capability_similarity("Risk_Analysis", "risk_analysis", "_"), 1.0);
    assert_eq!(
        capability_similarity("connection_risk_analysis_report", "connection_risk_analysis", "_"),
        0.75
    );
    assert!(capability_similarity("risk_report", "risk_analysis", "_") < 0.7);
    assert_eq!(capability_similarity("", "track", "_"), 0.0);
    assert_eq!(capability_similarity("pay-check", "check-pay", "-"), 1.0);
}

#[test]
fn test_order_by_capabilities() {
    let caps = vec!["first".to_string(), "second".to_string()];
    let assignments = vec![
        ("second".to_string(), "y".to_string()),
        ("first".to_string(), "x".to_string()),
        ("first".to_string(), "w".to_string()),
    ];
    let agents = vec!["y".to_string(), "z".to_string(), "x".to_string(), "w".to_string()];

    assert_eq!(
        order_by_capabilities(&caps, &assignments, &agents),
        vec!["x", "y", "z", "w"]
    );
}

fn ok_result(agent: &str, message: Option<&str>) -> AgentCallResult {
    let mut reply = AgentReply::ok("");
    reply.message = message.map(str::to_string);
    AgentCallResult::from_reply(agent, reply, Duration::from_millis(5))
}

#[test]
fn test_aggregate_messages_without_agent_text() {
    let results = vec![ok_result("tracker", None), ok_result("riskbot", Some(""))];

    let sequential = aggregate(&plan(&["track"], ExecutionMode::Sequential), &results, false);
    assert_eq!(sequential.message, "Request processed successfully");

    let parallel = aggregate(&plan(&["track"], ExecutionMode::Parallel), &results, true);
    assert_eq!(parallel.message, "Data collected from 2 agents");
    assert!(parallel.fallback_used);
    assert_eq!(parallel.intent, "locate bag");
}

#[test]
fn test_aggregate_parallel_bullets() {
    let results = vec![
        ok_result("tracker", Some("in Tokyo")),
        AgentCallResult::failure("riskbot", "down", Duration::ZERO),
        ok_result("notifier", Some("sms sent")),
    ];

    let result: RoutingResult =
        aggregate(&plan(&["track"], ExecutionMode::Parallel), &results, false);
    assert_eq!(
        result.message,
        "Combined results:\n• tracker: in Tokyo\n• notifier: sms sent"
    );
    assert_eq!(result.contributors().map(<[String]>::len), Some(2));
    assert_eq!(result.errors, vec!["down"]);
}

#[test]
fn test_aggregate_empty_is_no_agent_available() {
    let result = aggregate(&plan(&["track"], ExecutionMode::Sequential), &[], false);
    assert_eq!(result.failure, Some(RoutingFailure::NoAgentAvailable));
    assert!(result.provenance.is_none());
}
