//! Full poll cycles: mocked metrics endpoint → rules → chat

use home_alerter::{
    config::Telegram,
    notification::{Action, NotificationState},
    transport::{MessageId, TelegramTransport},
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_cold_kitchen_lifecycle() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    // everything fine
    serve_metrics(&server, Exposition::new().room("Kueche", 20.0, 50.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::None);
    assert!(transport.calls().is_empty());

    // kitchen gets cold
    serve_metrics(&server, Exposition::new().room("Kueche", 15.2, 50.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert!(report.changed);
    assert_eq!(report.action, Action::Send(MessageId::from("1")));
    assert_eq!(
        report.alerts,
        vec!["tado_sensor_temperature_value_type_HEATING_unit_celsius_zone_Kueche".to_string()]
    );

    let calls = transport.calls();
    let Call::Send(text) = &calls[0] else {
        panic!("expected a send, got {calls:?}");
    };
    assert!(text.contains("Die Temperatur im Zimmer *Kueche* ist unter 16 Grad."));
    assert!(text.ends_with("Schau mal besser nach..."));

    // colder, but the same alert
    serve_metrics(&server, Exposition::new().room("Kueche", 14.0, 50.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert!(!report.changed);
    assert_eq!(report.action, Action::None);

    // back to normal
    serve_metrics(&server, Exposition::new().room("Kueche", 18.0, 50.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Resolve);
    assert_eq!(poller.state().await.unwrap(), NotificationState::Idle);

    assert_eq!(transport.calls().len(), 2);
    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_growing_alert_set_edits_same_message() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    serve_metrics(&server, Exposition::new().room("Bad", 21.0, 80.0).build()).await;
    poller.poll_now().await.unwrap();

    serve_metrics(
        &server,
        Exposition::new()
            .room("Bad", 21.0, 80.0)
            .room("Flur", 12.0, 50.0)
            .build(),
    )
    .await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Edit(MessageId::from("1")));

    // shrinking is a change as well
    serve_metrics(&server, Exposition::new().room("Flur", 12.0, 50.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Edit(MessageId::from("1")));

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    let Call::Edit(_, last) = &calls[2] else {
        panic!("expected an edit, got {calls:?}");
    };
    assert!(last.contains("*Flur*"));
    assert!(!last.contains("*Bad*"));

    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_label_order_in_payload_does_not_matter() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    serve_metrics(
        &server,
        Exposition::new()
            .sample(TEMPERATURE, &[("zone", "Kueche"), ("unit", "celsius")], 15.0)
            .build(),
    )
    .await;
    poller.poll_now().await.unwrap();

    serve_metrics(
        &server,
        Exposition::new()
            .sample(TEMPERATURE, &[("unit", "celsius"), ("zone", "Kueche")], 15.0)
            .build(),
    )
    .await;
    let report = poller.poll_now().await.unwrap();

    assert!(!report.changed);
    assert_eq!(transport.calls().len(), 1);
    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_new_episode_gets_new_message() {
    let server = MockServer::start().await;
    let transport = RecordingTransport::new();
    let (poller, _task) = spawn_poller(&server, transport.clone());

    let humid = Exposition::new().room("Bad", 21.0, 90.0).build();
    let dry = Exposition::new().room("Bad", 21.0, 40.0).build();

    serve_metrics(&server, humid.clone()).await;
    poller.poll_now().await.unwrap();
    serve_metrics(&server, dry).await;
    poller.poll_now().await.unwrap();
    serve_metrics(&server, humid).await;
    let report = poller.poll_now().await.unwrap();

    // send, all-clear, send
    assert_eq!(report.action, Action::Send(MessageId::from("3")));
    assert_eq!(
        poller.state().await.unwrap(),
        NotificationState::Active(MessageId::from("3"))
    );
    poller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_same_seed_renders_same_text() {
    let first = RecordingTransport::new();
    let second = RecordingTransport::new();
    let body = Exposition::new().room("Bad", 10.0, 90.0).build();

    for transport in [&first, &second] {
        let server = MockServer::start().await;
        serve_metrics(&server, body.clone()).await;
        let (poller, _task) = spawn_poller(&server, transport.clone());
        poller.poll_now().await.unwrap();
        poller.shutdown().await.unwrap();
    }

    assert_eq!(first.calls(), second.calls());
}

#[tokio::test]
async fn test_telegram_end_to_end() {
    let metrics = MockServer::start().await;
    let telegram = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_partial_json(serde_json::json!({ "chat_id": 5, "parse_mode": "Markdown" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": { "message_id": 77 }
        })))
        .expect(1)
        .mount(&telegram)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/editMessageText"))
        .and(body_partial_json(serde_json::json!({ "chat_id": 5, "message_id": 77 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": { "message_id": 77 }
        })))
        .expect(1)
        .mount(&telegram)
        .await;

    let transport = TelegramTransport::new(&Telegram {
        token: "TOKEN".to_string(),
        chat_id: 5,
        api_url: telegram.uri(),
    })
    .unwrap();
    let (poller, _task) = spawn_poller(&metrics, Arc::new(transport));

    serve_metrics(&metrics, Exposition::new().room("Bad", 21.0, 80.0).build()).await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Send(MessageId::from(77)));

    serve_metrics(
        &metrics,
        Exposition::new()
            .room("Bad", 21.0, 80.0)
            .room("Wohnen", 21.0, 85.0)
            .build(),
    )
    .await;
    let report = poller.poll_now().await.unwrap();
    assert_eq!(report.action, Action::Edit(MessageId::from(77)));

    poller.shutdown().await.unwrap();
}
