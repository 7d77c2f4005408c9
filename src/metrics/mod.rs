//! Metrics source collaborator
//!
//! A [`Snapshot`] maps metric family names to the samples scraped for them.
//! The alert engine only needs label lookup and the numeric value of a sample;
//! everything about fetching and decoding lives behind [`MetricsSource`].

pub mod exposition;
pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CycleError;

pub use http::HttpMetricsSource;

/// One observation of a metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    /// Label pairs in the order the source produced them.
    pub labels: Vec<(String, String)>,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Samples of one scrape, grouped by metric family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    families: HashMap<String, Vec<Sample>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, family: impl Into<String>, sample: Sample) {
        self.families.entry(family.into()).or_default().push(sample);
    }

    pub fn with_sample(mut self, family: impl Into<String>, sample: Sample) -> Self {
        self.push(family, sample);
        self
    }

    /// Samples of `family` in source order. An absent family has no samples.
    pub fn family(&self, family: &str) -> &[Sample] {
        self.families
            .get(family)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of families in the snapshot.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Anything that can produce a fresh [`Snapshot`].
///
/// Implementations own their timeouts; the poll loop awaits `fetch` and does
/// not start another cycle until it returns.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, CycleError>;
}
