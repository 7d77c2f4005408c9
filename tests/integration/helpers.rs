//! Test helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use home_alerter::{
    actors::{PollerHandle, PollerSettings},
    config::MetricsConfig,
    error::{CycleError, TransportError},
    metrics::HttpMetricsSource,
    render::Renderer,
    rules::{RuleRegistry, default_rules},
    transport::{ChatTransport, MessageId},
};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEMPERATURE: &str = "tado_sensor_temperature_value";
pub const HUMIDITY: &str = "tado_sensor_humidity_percentage";
pub const HEATING_POWER: &str = "tado_activity_heating_power_percentage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(String),
    Edit(MessageId, String),
}

/// Chat double that records every call; send ids count up from "1".
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<bool>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<(), TransportError> {
        if *self.failing.lock().unwrap() {
            return Err(TransportError::Api {
                status: 503,
                body: "chat unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, text: &str) -> Result<MessageId, TransportError> {
        self.check()?;
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Send(text.to_string()));
        let sent = calls.iter().filter(|call| matches!(call, Call::Send(_))).count();
        Ok(MessageId::from(sent.to_string()))
    }

    async fn edit(&self, id: &MessageId, text: &str) -> Result<(), TransportError> {
        self.check()?;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Edit(id.clone(), text.to_string()));
        Ok(())
    }
}

/// Build an exposition payload with one gauge family per metric.
pub struct Exposition {
    families: Vec<(String, Vec<String>)>,
}

impl Exposition {
    pub fn new() -> Self {
        Self {
            families: Vec::new(),
        }
    }

    /// Add a sample; labels are written in the given order.
    pub fn sample(mut self, family: &str, labels: &[(&str, &str)], value: f64) -> Self {
        let labels = labels
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(",");
        let line = format!("{family}{{{labels}}} {value}");

        match self.families.iter_mut().find(|(name, _)| name == family) {
            Some((_, lines)) => lines.push(line),
            None => self.families.push((family.to_string(), vec![line])),
        }
        self
    }

    pub fn room(self, zone: &str, temperature: f64, humidity: f64) -> Self {
        self.sample(
            TEMPERATURE,
            &[("zone", zone), ("type", "HEATING"), ("unit", "celsius")],
            temperature,
        )
        .sample(HUMIDITY, &[("zone", zone), ("type", "HEATING")], humidity)
        .sample(HEATING_POWER, &[("zone", zone), ("type", "HEATING")], 10.0)
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        for (family, lines) in &self.families {
            out.push_str(&format!("# HELP {family} exported by tado\n"));
            out.push_str(&format!("# TYPE {family} gauge\n"));
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Replace whatever the mock endpoint served before with `body`.
pub async fn serve_metrics(server: &MockServer, body: impl Into<String>) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

pub async fn serve_status(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn metrics_config(server: &MockServer) -> MetricsConfig {
    MetricsConfig {
        endpoint: format!("{}/metrics", server.uri()),
        token: None,
        timeout_secs: 5,
    }
}

pub fn settings(interval: Duration, fail_fast: bool) -> PollerSettings {
    PollerSettings {
        interval,
        fail_fast,
        seed: Some(42),
    }
}

/// Poller over the default rules that only runs cycles on request.
pub fn spawn_poller(
    server: &MockServer,
    transport: Arc<dyn ChatTransport>,
) -> (PollerHandle, JoinHandle<Result<(), CycleError>>) {
    spawn_poller_with(
        server,
        transport,
        RuleRegistry::from_config(&default_rules()).unwrap(),
        settings(Duration::from_secs(3600), true),
    )
}

pub fn spawn_poller_with(
    server: &MockServer,
    transport: Arc<dyn ChatTransport>,
    registry: RuleRegistry,
    settings: PollerSettings,
) -> (PollerHandle, JoinHandle<Result<(), CycleError>>) {
    let source = HttpMetricsSource::new(&metrics_config(server)).unwrap();
    PollerHandle::spawn(
        registry,
        Renderer::default(),
        Arc::new(source),
        transport,
        settings,
    )
}
