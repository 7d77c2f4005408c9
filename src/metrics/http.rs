use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, trace};

use crate::config::MetricsConfig;
use crate::error::{CycleError, FetchError};

use super::{MetricsSource, Snapshot, exposition};

/// Scrapes an exposition endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMetricsSource {
    pub fn new(config: &MetricsConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Result<Snapshot, CycleError> {
        trace!("requesting metrics");

        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.header("X-MONITORING-SECRET", token);
        }

        let response = request.send().await.map_err(FetchError::from)?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()).into());
        }

        let body = response.text().await.map_err(FetchError::from)?;
        let snapshot = exposition::parse(&body)?;

        trace!("parsed {} metric families", snapshot.len());
        Ok(snapshot)
    }
}
