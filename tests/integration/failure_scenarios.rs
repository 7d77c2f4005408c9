//! Failure tests for the poll loop
//!
//! A failed cycle must leave the notification state and the alert baseline
//! exactly as they were, whatever stage it failed in.

use std::time::Duration;

use home_alerter::{
    error::CycleError,
    notification::{Action, NotificationState},
    rules::{Condition, RuleRegistry},
    transport::MessageId,
};
use pretty_assertions::assert_eq;
use wiremock::MockServer;

use crate::helpers::*;

fn cycle_error(err: anyhow::Error) -> CycleError {
    err.downcast::<CycleError>()
        .expect("poll_now should fail with a cycle error")
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_fetch_error() {
    let server = MockServer::start().await;
    serve_status(&server, 500).await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    let err = cycle_error(poller.poll_now().await.unwrap_err());

    assert_eq!(err.kind(), "fetch");
    assert!(transport.calls().is_empty());
    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_payload_is_a_parse_error() {
    let server = MockServer::start().await;
    serve_metrics(&server, "# TYPE x gauge\nx{zone=\"Bad} 1\n").await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    let err = cycle_error(poller.poll_now().await.unwrap_err());

    assert_eq!(err.kind(), "parse");
    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fetch_failure_while_active_keeps_message() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    let humid = Exposition::new().room("Bad", 21.0, 90.0).build();
    serve_metrics(&server, humid.clone()).await;
    poller.poll_now().await.unwrap();

    serve_status(&server, 503).await;
    assert!(poller.poll_now().await.is_err());
    assert_eq!(
        poller.state().await.unwrap(),
        NotificationState::Active(MessageId::from("1"))
    );

    // an outage is not an all-clear: the same alert comes back without an edit
    serve_metrics(&server, humid).await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::None);
    assert_eq!(transport.calls().len(), 1);

    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_label_is_a_template_error() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let mut registry = RuleRegistry::new();
    registry
        .add_rule(
            "Feuchtigkeit",
            "Zu feucht im Zimmer *{{ .zone }}*",
            HUMIDITY,
            Condition::above(75.0),
        )
        .unwrap();
    let (poller, _task) = spawn_poller_with(
        &server,
        transport.clone(),
        registry,
        settings(Duration::from_secs(3600), true),
    );

    serve_metrics(
        &server,
        Exposition::new()
            .sample(HUMIDITY, &[("room", "Bad")], 90.0)
            .build(),
    )
    .await;
    let err = cycle_error(poller.poll_now().await.unwrap_err());

    assert_eq!(err.kind(), "template");
    assert!(err.to_string().contains("zone"));
    assert!(transport.calls().is_empty());
    assert_eq!(poller.state().await.unwrap(), NotificationState::Idle);

    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_send_is_retried_next_cycle() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());
    serve_metrics(&server, Exposition::new().room("Bad", 21.0, 90.0).build()).await;

    transport.set_failing(true);
    let err = cycle_error(poller.poll_now().await.unwrap_err());
    assert_eq!(err.kind(), "transport");
    assert_eq!(poller.state().await.unwrap(), NotificationState::Idle);

    // the baseline was not committed, so the same set still counts as new
    transport.set_failing(false);
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Send(MessageId::from("1")));

    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fail_fast_stops_timer_loop() {
    let server = MockServer::start().await;
    serve_status(&server, 500).await;
    let transport = RecordingTransport::new();
    let (_poller, task) = spawn_poller_with(
        &server,
        transport,
        RuleRegistry::new(),
        settings(Duration::from_millis(50), true),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("poller should stop on its own")
        .unwrap();

    assert!(matches!(result, Err(CycleError::Fetch(_))));
}

#[tokio::test]
async fn test_without_fail_fast_loop_keeps_running() {
    let server = MockServer::start().await;
    serve_status(&server, 500).await;
    let transport = RecordingTransport::new();
    let (poller, task) = spawn_poller_with(
        &server,
        transport.clone(),
        RuleRegistry::new(),
        settings(Duration::from_millis(20), false),
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!task.is_finished());

    serve_metrics(&server, Exposition::new().room("Bad", 21.0, 50.0).build()).await;
    assert_eq!(poller.poll_now().await.unwrap().action, Action::None);

    poller.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}
