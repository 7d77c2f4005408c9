//! Turning an alert set into chat text
//!
//! Rule descriptions are small templates with `{{ .label }}` placeholders
//! (the leading dot is optional). Phrasings for the surrounding lines come
//! from an injected [`Phrasebook`]; the random choice among them is driven by
//! a caller-provided RNG so a seeded generator gives reproducible output.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::alerts::TriggeredSet;
use crate::error::TemplateError;
use crate::metrics::Sample;
use crate::ventilation::Recommendation;

static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid placeholder regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Label(String),
}

/// A compiled description template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }

            let position = offset + open;
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(TemplateError::Unclosed { position })?;

            let inner = after_open[..close].trim();
            let name = inner.strip_prefix('.').unwrap_or(inner).trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder { position });
            }
            if !PLACEHOLDER_NAME.is_match(name) {
                return Err(TemplateError::InvalidName {
                    name: name.to_string(),
                });
            }
            segments.push(Segment::Label(name.to_string()));

            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Label names referenced by the template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Label(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Substitute every placeholder with the matching label of `sample`.
    pub fn render(&self, rule: &str, sample: &Sample) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Label(name) => {
                    let value = sample.label(name).ok_or_else(|| TemplateError::MissingLabel {
                        rule: rule.to_string(),
                        label: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Phrasings used around the alert lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrasebook {
    /// One of these is sent when every alert is gone
    pub resolved: Vec<String>,

    /// One of these opens a message listing active alerts
    pub attention: Vec<String>,

    /// Last line of a message listing active alerts
    pub closing: String,

    pub ventilation: VentilationPhrases,

    /// Reply to a chat command the bot does not know
    pub unknown_command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VentilationPhrases {
    pub heading: String,
    pub no: Vec<String>,
    pub maybe: Vec<String>,
    pub yes: Vec<String>,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|phrase| phrase.to_string()).collect()
}

impl Default for Phrasebook {
    fn default() -> Self {
        Self {
            resolved: phrases(&[
                "Alles paletti. Hier gibt es nichts mehr zu sehen.",
                "Das wars schon. Danke für ihre Aufmerksamkeit.",
                "Weiterschlafen, hier gibts nichts zu sehen.",
                "Gut gemacht!",
            ]),
            attention: phrases(&[
                "Hier is irgendwas gerade eher uncool:",
                "Jo, diggi, das is irgendwie blöd hier:",
                "Was ist denn hier los? Schau ma:",
                "Hier schepperts gleich, was is denn los hier?",
            ]),
            closing: "Schau mal besser nach...".to_string(),
            ventilation: VentilationPhrases::default(),
            unknown_command: "Das versteh ich nicht.".to_string(),
        }
    }
}

impl Default for VentilationPhrases {
    fn default() -> Self {
        Self {
            heading: "*Lüftungserinnerung*".to_string(),
            no: phrases(&[
                "Es wäre jetzt eigentlich Zeit zu lüften, aber draußen isses noch feuchter als bei Oma im Keller.",
            ]),
            maybe: phrases(&["Man könnte jetzt mal lüften, aber viel trockener wirds dadurch nicht."]),
            yes: phrases(&["LÜFTEN! LÜFTEN! LÜFTEN!"]),
        }
    }
}

impl Phrasebook {
    /// Names of phrase pools that are empty and therefore unusable.
    pub fn empty_pools(&self) -> Vec<&'static str> {
        [
            ("resolved", self.resolved.is_empty()),
            ("attention", self.attention.is_empty()),
            ("ventilation.no", self.ventilation.no.is_empty()),
            ("ventilation.maybe", self.ventilation.maybe.is_empty()),
            ("ventilation.yes", self.ventilation.yes.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect()
    }
}

/// Uniformly pick one phrase. An empty pool yields an empty line.
fn choose<'a, R: Rng + ?Sized>(pool: &'a [String], rng: &mut R) -> &'a str {
    if pool.is_empty() {
        return "";
    }
    &pool[rng.random_range(0..pool.len())]
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    phrases: Phrasebook,
}

impl Renderer {
    pub fn new(phrases: Phrasebook) -> Self {
        Self { phrases }
    }

    pub fn phrases(&self) -> &Phrasebook {
        &self.phrases
    }

    /// Render the message for `alerts`.
    ///
    /// An empty set renders to a single all-clear line. Otherwise the text is
    /// a preamble, a blank line, one line per alert in set order, a blank
    /// line and the closing phrase.
    pub fn render<R: Rng + ?Sized>(
        &self,
        alerts: &TriggeredSet,
        rng: &mut R,
    ) -> Result<String, TemplateError> {
        if alerts.is_empty() {
            return Ok(choose(&self.phrases.resolved, rng).to_string());
        }

        let mut lines = Vec::with_capacity(alerts.len() + 4);
        lines.push(choose(&self.phrases.attention, rng).to_string());
        lines.push(String::new());

        for alert in alerts {
            let rule = alert.rule();
            lines.push(rule.description.render(&rule.title, alert.sample())?);
        }

        lines.push(String::new());
        lines.push(self.phrases.closing.clone());

        Ok(lines.join("\n"))
    }

    /// One phrase matching `recommendation`, without heading.
    pub fn recommendation_phrase<R: Rng + ?Sized>(
        &self,
        recommendation: Recommendation,
        rng: &mut R,
    ) -> &str {
        let ventilation = &self.phrases.ventilation;
        let pool = match recommendation {
            Recommendation::No => &ventilation.no,
            Recommendation::Maybe => &ventilation.maybe,
            Recommendation::Yes => &ventilation.yes,
        };
        choose(pool, rng)
    }

    /// Render a ventilation reminder for the given recommendation.
    pub fn render_reminder<R: Rng + ?Sized>(
        &self,
        recommendation: Recommendation,
        rng: &mut R,
    ) -> String {
        [
            self.phrases.ventilation.heading.as_str(),
            "",
            self.recommendation_phrase(recommendation, rng),
        ]
        .join("\n")
    }
}
