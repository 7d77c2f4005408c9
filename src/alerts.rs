//! Rule evaluation over a metrics snapshot
//!
//! Every (rule, sample) pair whose condition holds becomes a
//! [`TriggeredAlert`]. Its identity key is what the tracker compares across
//! polls, so it only depends on the metric family and the label *set* of the
//! sample: labels are sorted by name before being joined.

use std::sync::Arc;

use tracing::trace;

use crate::metrics::{Sample, Snapshot};
use crate::rules::{AlertRule, RuleRegistry};

pub const KEY_SEPARATOR: &str = "_";

/// Build the identity key for a sample of `metric`.
///
/// `tado_sensor_temperature_value{zone="Kueche",unit="celsius"}` becomes
/// `tado_sensor_temperature_value_unit_celsius_zone_Kueche`.
pub fn identity_key(metric: &str, sample: &Sample) -> String {
    let mut labels: Vec<&(String, String)> = sample.labels.iter().collect();
    labels.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut parts = Vec::with_capacity(1 + labels.len() * 2);
    parts.push(metric);
    for (name, value) in labels {
        parts.push(name.as_str());
        parts.push(value.as_str());
    }

    parts.join(KEY_SEPARATOR)
}

/// A rule paired with the sample that satisfied it.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    key: String,
    rule: Arc<AlertRule>,
    sample: Sample,
}

impl TriggeredAlert {
    pub fn new(rule: Arc<AlertRule>, sample: Sample) -> Self {
        let key = identity_key(&rule.metric, &sample);
        Self { key, rule, sample }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rule(&self) -> &AlertRule {
        &self.rule
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }
}

/// Alerts of one evaluation pass, ordered by rule registration and then by
/// sample order within the family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggeredSet {
    alerts: Vec<TriggeredAlert>,
}

impl TriggeredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TriggeredAlert> {
        self.alerts.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.alerts.iter().map(TriggeredAlert::key)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl FromIterator<TriggeredAlert> for TriggeredSet {
    fn from_iter<T: IntoIterator<Item = TriggeredAlert>>(iter: T) -> Self {
        Self {
            alerts: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TriggeredSet {
    type Item = &'a TriggeredAlert;
    type IntoIter = std::slice::Iter<'a, TriggeredAlert>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Apply every rule of the registry to the snapshot.
///
/// A family missing from the snapshot simply contributes no samples.
pub fn evaluate(registry: &RuleRegistry, snapshot: &Snapshot) -> TriggeredSet {
    registry
        .rules()
        .iter()
        .flat_map(|rule| {
            snapshot
                .family(&rule.metric)
                .iter()
                .filter(move |sample| rule.matches(sample))
                .map(move |sample| {
                    let alert = TriggeredAlert::new(Arc::clone(rule), sample.clone());
                    trace!("{}: {} triggered ({})", rule.title, alert.key(), sample.value);
                    alert
                })
        })
        .collect()
}
