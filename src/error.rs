//! Error types for a poll cycle
//!
//! Every class is fatal to the cycle it occurs in. The driver receives a
//! [`CycleError`] and decides whether to stop or wait for the next tick.

use thiserror::Error;

/// The metrics endpoint could not be reached or answered with a non-2xx status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("metrics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics endpoint answered with status {0}")]
    Status(reqwest::StatusCode),
}

/// A line of the exposition payload could not be parsed.
#[derive(Debug, Error)]
#[error("malformed exposition payload at line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// A description template is malformed or references a label the sample lacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {position}")]
    Unclosed { position: usize },

    #[error("empty placeholder at byte {position}")]
    EmptyPlaceholder { position: usize },

    #[error("invalid placeholder name `{name}`")]
    InvalidName { name: String },

    #[error("rule `{rule}` references label `{label}` which the sample does not carry")]
    MissingLabel { rule: String, label: String },
}

/// Sending or editing a chat message failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API answered with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected chat API response: {0}")]
    MalformedResponse(String),
}

/// Anything that aborts a poll cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A ventilation reminder could not be produced or delivered.
#[derive(Debug, Error)]
pub enum VentilationError {
    #[error("weather request failed: {0}")]
    Weather(#[from] reqwest::Error),

    #[error("weather service answered with status {0}")]
    WeatherStatus(reqwest::StatusCode),

    #[error("indoor climate unavailable: {0}")]
    Metrics(#[from] CycleError),

    #[error("no indoor {0} samples to average")]
    NoIndoorSamples(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CycleError {
    /// Stable label used in log lines so operators can tell a misconfigured
    /// rule apart from a connectivity problem.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Parse(_) => "parse",
            CycleError::Template(_) => "template",
            CycleError::Transport(_) => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_template_from_transport() {
        let template: CycleError = TemplateError::MissingLabel {
            rule: "Temperatur".to_string(),
            label: "zone".to_string(),
        }
        .into();
        let transport: CycleError = TransportError::Api {
            status: 400,
            body: "bad request".to_string(),
        }
        .into();

        assert_eq!(template.kind(), "template");
        assert_eq!(transport.kind(), "transport");
        assert!(template.to_string().contains("`zone`"));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err: CycleError = ParseError::new(7, "missing value").into();
        assert_eq!(err.kind(), "parse");
        assert_eq!(
            err.to_string(),
            "malformed exposition payload at line 7: missing value"
        );
    }
}
