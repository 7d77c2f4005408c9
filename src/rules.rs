//! Alert rules and the registry holding them
//!
//! Rules are registered once at startup and never change afterwards. The
//! registration order is the order alerts are evaluated and rendered in.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::TemplateError;
use crate::metrics::Sample;
use crate::render::Template;

/// Decides whether a single sample violates a rule.
///
/// Implementations must be total: a sample lacking an expected label does not
/// match, it never panics.
pub trait Predicate {
    fn matches(&self, sample: &Sample) -> bool;
}

/// Closed set of conditions a rule can check.
///
/// ```json
/// { "kind": "guarded", "labels": { "unit": "celsius" },
///   "condition": { "kind": "below", "threshold": 16.0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Value strictly greater than the threshold
    Above { threshold: f64 },

    /// Value strictly lower than the threshold
    Below { threshold: f64 },

    /// Every listed label must be present with the given value before the
    /// inner condition is checked
    Guarded {
        labels: BTreeMap<String, String>,
        condition: Box<Condition>,
    },
}

impl Condition {
    pub fn above(threshold: f64) -> Self {
        Condition::Above { threshold }
    }

    pub fn below(threshold: f64) -> Self {
        Condition::Below { threshold }
    }

    pub fn guarded<I, K, V>(labels: I, condition: Condition) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Condition::Guarded {
            labels: labels
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
            condition: Box::new(condition),
        }
    }
}

impl Predicate for Condition {
    fn matches(&self, sample: &Sample) -> bool {
        // comparisons against NaN are false, so a NaN sample never triggers
        match self {
            Condition::Above { threshold } => sample.value > *threshold,
            Condition::Below { threshold } => sample.value < *threshold,
            Condition::Guarded { labels, condition } => {
                labels
                    .iter()
                    .all(|(name, expected)| sample.label(name) == Some(expected.as_str()))
                    && condition.matches(sample)
            }
        }
    }
}

/// Immutable rule definition.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub id: Uuid,
    pub title: String,
    pub description: Template,
    /// Target metric family
    pub metric: String,
    pub condition: Condition,
}

impl AlertRule {
    pub fn matches(&self, sample: &Sample) -> bool {
        self.condition.matches(sample)
    }
}

/// Declarative rule as it appears in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub title: String,
    pub description: String,
    pub metric: String,
    pub condition: Condition,
}

/// The rules watched over a tado exporter when the configuration lists none.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            title: "Heizleistung".to_string(),
            description: "Die Heizleistung im Zimmer *{{ .zone }}* ist über 60%.".to_string(),
            metric: "tado_activity_heating_power_percentage".to_string(),
            condition: Condition::above(60.0),
        },
        RuleConfig {
            title: "Feuchtigkeit".to_string(),
            description: "Die Luftfeuchtigkeit im Zimmer *{{ .zone }}* ist über 75%.".to_string(),
            metric: "tado_sensor_humidity_percentage".to_string(),
            condition: Condition::above(75.0),
        },
        RuleConfig {
            title: "Temperatur".to_string(),
            description: "Die Temperatur im Zimmer *{{ .zone }}* ist unter 16 Grad.".to_string(),
            metric: "tado_sensor_temperature_value".to_string(),
            condition: Condition::guarded([("unit", "celsius")], Condition::below(16.0)),
        },
    ]
}

/// Ordered list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<AlertRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration, keeping list order.
    pub fn from_config(rules: &[RuleConfig]) -> Result<Self, TemplateError> {
        let mut registry = Self::new();
        for rule in rules {
            registry.add_rule(
                &rule.title,
                &rule.description,
                &rule.metric,
                rule.condition.clone(),
            )?;
        }
        Ok(registry)
    }

    /// Append a rule and return its freshly generated id.
    ///
    /// The description template is compiled here, so a malformed template is
    /// rejected at startup. Labels it references can only be checked against a
    /// concrete sample at render time.
    pub fn add_rule(
        &mut self,
        title: &str,
        description: &str,
        metric: &str,
        condition: Condition,
    ) -> Result<Uuid, TemplateError> {
        let description = Template::parse(description)?;
        let id = Uuid::new_v4();

        debug!("registered rule {title} ({id}) on {metric}");

        self.rules.push(Arc::new(AlertRule {
            id,
            title: title.to_string(),
            description,
            metric: metric.to_string(),
            condition,
        }));

        Ok(id)
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &[Arc<AlertRule>] {
        &self.rules
    }

    pub fn get(&self, id: Uuid) -> Option<&Arc<AlertRule>> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
