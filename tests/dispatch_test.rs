//! Dispatch and fallback against mock providers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{
    empty, model_of, mount_answer, mount_online, ok, quota, requests_for, server_error, slow,
};
use common::log_capture::TestLogCapture;
use common::logger::TestLogger;
use luna::LunaError;
use luna::core::availability::AvailabilitySnapshot;
use luna::core::credentials::CredentialSet;
use luna::core::dispatch::{DispatchOutcome, Orchestrator};
use luna::core::events::{self, ProviderState, StatusBoard};
use luna::core::fallback::AttemptOutcome;
use luna::core::history::ConversationHistory;
use luna::core::http::ProviderClient;
use luna::core::provider::ProviderRegistry;
use luna::core::renderer::BufferTarget;
use luna::core::session::ChatSession;
use luna::error::{DISPATCH_FAILED_NOTICE, NO_AI_AVAILABLE_NOTICE};
use luna::test_utils::{TEST_MODEL, make_fast_config, make_mock_registry, make_test_descriptor, mock_path};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer};

const MESSAGE: &str = "What is the capital of France?";
const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
const SLOW: Duration = Duration::from_secs(2);

fn orchestrator(registry: ProviderRegistry, timeout: Duration) -> Orchestrator {
    Orchestrator::new(
        Arc::new(registry),
        Arc::new(CredentialSet::default()),
        ProviderClient::new().unwrap(),
    )
    .with_timeout(timeout)
}

fn snapshot(ids: &[&str]) -> AvailabilitySnapshot {
    AvailabilitySnapshot::from_available(ids.iter().map(|s| (*s).to_string()))
}

async fn run(orchestrator: &Orchestrator, available: &[&str]) -> (DispatchOutcome, AvailabilitySnapshot) {
    let mut snapshot = snapshot(available);
    let mut history = ConversationHistory::default();
    let outcome = orchestrator.dispatch(MESSAGE, &mut snapshot, &mut history).await;
    (outcome, snapshot)
}

fn providers_tried(outcome: &DispatchOutcome) -> Vec<&str> {
    outcome
        .trace
        .attempts
        .iter()
        .map(|a| a.provider.as_str())
        .collect()
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test]
async fn timeout_retries_once_on_nearest_higher_provider() {
    let log = TestLogger::new("timeout_retries_once_on_nearest_higher_provider");
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2), ("c", 3)]);
    mount_answer(&server, "a", MESSAGE, slow("late a", SLOW)).await;
    mount_answer(&server, "b", MESSAGE, slow("late b", SLOW)).await;
    mount_answer(&server, "c", MESSAGE, ok("Paris")).await;

    log.phase("dispatch");
    let (outcome, _) = run(&orchestrator(registry, SHORT_TIMEOUT), &["a", "b", "c"]).await;

    assert!(matches!(
        outcome.result,
        Err(LunaError::AllProvidersExhausted { attempts: 2 })
    ));
    assert_eq!(providers_tried(&outcome), ["a", "b"]);
    assert!(requests_for(&server, "c", MESSAGE).await.is_empty());
    log.finish_ok();
}

#[tokio::test]
async fn timeout_then_success_on_higher_provider() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2)]);
    mount_answer(&server, "a", MESSAGE, slow("late", SLOW)).await;
    mount_answer(&server, "b", MESSAGE, ok("Paris")).await;

    let (outcome, snapshot) = run(&orchestrator(registry, SHORT_TIMEOUT), &["a", "b"]).await;

    let reply = outcome.result.unwrap();
    assert_eq!(reply.provider, "b");
    assert_eq!(reply.text, "Paris");
    assert_eq!(snapshot.most_recently_used(), Some("b"));
    assert_eq!(outcome.trace.attempts[0].outcome, AttemptOutcome::Timeout);
}

#[tokio::test]
async fn timeout_on_highest_available_is_exhausted() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2)]);
    mount_answer(&server, "a", MESSAGE, ok("never asked")).await;
    mount_answer(&server, "b", MESSAGE, slow("late", SLOW)).await;

    let orchestrator =
        orchestrator(registry, SHORT_TIMEOUT).with_preferred(Some("b".to_string()));
    let (outcome, _) = run(&orchestrator, &["a", "b"]).await;

    assert!(matches!(outcome.result, Err(LunaError::AllProvidersExhausted { .. })));
    assert!(requests_for(&server, "a", MESSAGE).await.is_empty());
}

// =============================================================================
// Rate limits
// =============================================================================

fn registry_with_reduced_models(server: &MockServer) -> ProviderRegistry {
    let mut a = make_test_descriptor("a", 1, &format!("{}{}", server.uri(), mock_path("a")));
    a.reduced_models = vec!["small-1".to_string(), "small-2".to_string()];
    let b = make_test_descriptor("b", 2, &format!("{}{}", server.uri(), mock_path("b")));
    ProviderRegistry::new(vec![a, b]).unwrap()
}

#[tokio::test]
async fn rate_limit_walks_reduced_models_then_moves_on() {
    let server = MockServer::start().await;
    let registry = registry_with_reduced_models(&server);
    mount_answer(&server, "a", MESSAGE, quota()).await;
    mount_answer(&server, "b", MESSAGE, ok("Paris")).await;

    let (outcome, _) = run(&orchestrator(registry, Duration::from_secs(5)), &["a", "b"]).await;

    assert_eq!(outcome.result.unwrap().provider, "b");
    let models: Vec<_> = requests_for(&server, "a", MESSAGE)
        .await
        .iter()
        .filter_map(model_of)
        .collect();
    assert_eq!(models, [TEST_MODEL, "small-1", "small-2"]);
    assert_eq!(
        outcome
            .trace
            .attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::RateLimited)
            .count(),
        3
    );
}

#[tokio::test]
async fn rate_limit_recovers_on_reduced_model() {
    let server = MockServer::start().await;
    let registry = registry_with_reduced_models(&server);
    Mock::given(method("POST"))
        .and(path(mock_path("a")))
        .and(body_partial_json(json!({ "model": TEST_MODEL })))
        .respond_with(quota())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(mock_path("a")))
        .and(body_partial_json(json!({ "model": "small-1" })))
        .respond_with(ok("Paris, from a smaller model"))
        .mount(&server)
        .await;

    let (outcome, _) = run(&orchestrator(registry, Duration::from_secs(5)), &["a", "b"]).await;

    let reply = outcome.result.unwrap();
    assert_eq!(reply.provider, "a");
    assert_eq!(reply.model, "small-1");
}

// =============================================================================
// Empty replies and hard failures
// =============================================================================

#[tokio::test]
async fn empty_reply_is_a_soft_pass() {
    let (log, capture) = TestLogger::with_capture("empty_reply_is_a_soft_pass");
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2)]);
    mount_answer(&server, "a", MESSAGE, empty()).await;
    mount_answer(&server, "b", MESSAGE, ok("Paris")).await;
    log.http_mock("a", 200);

    let (outcome, _) = run(&orchestrator(registry, Duration::from_secs(5)), &["a", "b"]).await;

    assert_eq!(outcome.result.unwrap().text, "Paris");
    let outcomes: Vec<_> = outcome.trace.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(outcomes, [AttemptOutcome::EmptyResponse, AttemptOutcome::Success]);
    capture.assert_logged_at_level(tracing::Level::INFO, "Passing to next provider");
    capture.assert_field_logged("outcome", "empty_response");
    log.finish_ok();
}

#[tokio::test]
async fn empty_reply_prefers_simplest_lower_provider() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2), ("c", 3)]);
    mount_answer(&server, "a", MESSAGE, ok("from a")).await;
    mount_answer(&server, "b", MESSAGE, ok("from b")).await;
    mount_answer(&server, "c", MESSAGE, empty()).await;

    let orchestrator = orchestrator(registry, Duration::from_secs(5))
        .with_preferred(Some("c".to_string()));
    let (outcome, _) = run(&orchestrator, &["a", "b", "c"]).await;

    assert_eq!(providers_tried(&outcome), ["c", "a"]);
    assert_eq!(outcome.result.unwrap().text, "from a");
}

#[tokio::test]
async fn server_error_stops_dispatch() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2)]);
    mount_answer(&server, "a", MESSAGE, server_error()).await;
    mount_answer(&server, "b", MESSAGE, ok("Paris")).await;

    let (outcome, _) = run(&orchestrator(registry, Duration::from_secs(5)), &["a", "b"]).await;

    match outcome.result {
        Err(LunaError::DispatchFailed { provider, .. }) => assert_eq!(provider, "a"),
        other => panic!("expected DispatchFailed, got {other:?}"),
    }
    assert!(requests_for(&server, "b", MESSAGE).await.is_empty());
}

#[tokio::test]
async fn nothing_available_is_exhausted_without_requests() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1)]);

    let (outcome, _) = run(&orchestrator(registry, Duration::from_secs(5)), &[]).await;

    assert!(matches!(
        outcome.result,
        Err(LunaError::AllProvidersExhausted { attempts: 0 })
    ));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn success_updates_history_and_reports_status() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("b", 2)]);
    mount_answer(&server, "a", MESSAGE, empty()).await;
    mount_answer(&server, "b", MESSAGE, ok("Paris")).await;

    let (reporter, mut rx) = events::channel();
    let orchestrator = orchestrator(registry, Duration::from_secs(5)).with_reporter(reporter);
    let mut snapshot = snapshot(&["a", "b"]);
    let mut history = ConversationHistory::default();
    orchestrator
        .dispatch(MESSAGE, &mut snapshot, &mut history)
        .await
        .result
        .unwrap();

    assert_eq!(history.len(), 1);
    let exchange = history.iter().next().unwrap();
    assert_eq!(exchange.user, MESSAGE);
    assert_eq!(exchange.assistant, "Paris");

    let mut board = StatusBoard::default();
    board.drain(&mut rx);
    assert_eq!(board.get("a"), Some(ProviderState::Offline));
    assert_eq!(board.get("b"), Some(ProviderState::MostRecentlyUsed));
}

// =============================================================================
// Through the session
// =============================================================================

#[tokio::test]
async fn empty_lowest_and_unavailable_highest_shows_notice() {
    let log = TestLogger::new("empty_lowest_and_unavailable_highest_shows_notice");
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1), ("c", 3)]);
    // c never answers its probe.
    mount_online(&server, "a").await;
    mount_answer(&server, "a", MESSAGE, empty()).await;

    let target = Arc::new(BufferTarget::new());
    let session = ChatSession::new(
        &make_fast_config(),
        Arc::new(registry),
        Arc::new(CredentialSet::default()),
        target.clone(),
    )
    .unwrap();

    log.phase("ask");
    let answer = session.ask(MESSAGE).await.unwrap();
    answer.render.wait().await;

    assert!(matches!(
        answer.outcome.result,
        Err(LunaError::AllProvidersExhausted { .. })
    ));
    assert_eq!(answer.render.output(), NO_AI_AVAILABLE_NOTICE);
    assert_eq!(target.text_of(answer.render.generation()), NO_AI_AVAILABLE_NOTICE);
    assert!(requests_for(&server, "c", MESSAGE).await.is_empty());
    log.finish_ok();
}

#[tokio::test]
async fn transport_failure_shows_generic_notice() {
    let server = MockServer::start().await;
    let registry = make_mock_registry(&server.uri(), &[("a", 1)]);
    mount_online(&server, "a").await;
    mount_answer(&server, "a", MESSAGE, server_error()).await;

    let session = ChatSession::new(
        &make_fast_config(),
        Arc::new(registry),
        Arc::new(CredentialSet::default()),
        Arc::new(BufferTarget::new()),
    )
    .unwrap();

    let answer = session.ask(MESSAGE).await.unwrap();
    answer.render.wait().await;

    assert_eq!(answer.render.output(), DISPATCH_FAILED_NOTICE);
    assert!(!answer.render.output().contains("internal error"));
}
