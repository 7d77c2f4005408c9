//! Parser for the Prometheus text exposition format
//!
//! ```text
//! # HELP tado_sensor_temperature_value Current temperature
//! # TYPE tado_sensor_temperature_value gauge
//! tado_sensor_temperature_value{zone="Kueche",unit="celsius"} 15.2
//! ```
//!
//! Histogram and summary series (`_bucket`, `_sum`, `_count`) are grouped
//! under the family declared by their `# TYPE` line. Label order is kept as
//! written in the payload.

use std::collections::HashMap;

use crate::error::ParseError;

use super::{Sample, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "counter" => Some(Self::Counter),
            "gauge" => Some(Self::Gauge),
            "histogram" => Some(Self::Histogram),
            "summary" => Some(Self::Summary),
            "untyped" => Some(Self::Untyped),
            _ => None,
        }
    }
}

/// Parse a full exposition payload into a [`Snapshot`].
pub fn parse(payload: &str) -> Result<Snapshot, ParseError> {
    let mut types: HashMap<String, MetricType> = HashMap::new();
    let mut snapshot = Snapshot::new();

    for (index, raw) in payload.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();

        if text.is_empty() {
            continue;
        }

        if let Some(comment) = text.strip_prefix('#') {
            parse_comment(comment, line, &mut types)?;
            continue;
        }

        let (name, sample) = parse_sample(text, line)?;
        snapshot.push(family_name(name, &types), sample);
    }

    Ok(snapshot)
}

fn parse_comment(
    comment: &str,
    line: usize,
    types: &mut HashMap<String, MetricType>,
) -> Result<(), ParseError> {
    let mut parts = comment.split_whitespace();

    // HELP text and free-form comments carry nothing the engine needs
    if parts.next() != Some("TYPE") {
        return Ok(());
    }

    let name = parts
        .next()
        .ok_or_else(|| ParseError::new(line, "TYPE line without metric name"))?;
    let kind = parts
        .next()
        .ok_or_else(|| ParseError::new(line, "TYPE line without metric type"))?;
    let kind = MetricType::parse(kind)
        .ok_or_else(|| ParseError::new(line, format!("unknown metric type `{kind}`")))?;

    if types.insert(name.to_string(), kind).is_some() {
        return Err(ParseError::new(line, format!("second TYPE line for `{name}`")));
    }

    Ok(())
}

fn family_name<'a>(name: &'a str, types: &HashMap<String, MetricType>) -> &'a str {
    if types.contains_key(name) {
        return name;
    }

    for suffix in ["_bucket", "_sum", "_count"] {
        let Some(base) = name.strip_suffix(suffix) else {
            continue;
        };

        match types.get(base) {
            Some(MetricType::Histogram) => return base,
            Some(MetricType::Summary) if suffix != "_bucket" => return base,
            _ => {}
        }
    }

    name
}

fn parse_sample(text: &str, line: usize) -> Result<(&str, Sample), ParseError> {
    let mut cursor = Cursor {
        text,
        pos: 0,
        line,
    };

    let name = cursor.name(true)?;
    cursor.skip_whitespace();

    let labels = if cursor.peek() == Some(b'{') {
        cursor.labels()?
    } else {
        Vec::new()
    };

    cursor.skip_whitespace();
    let value = cursor.token();
    if value.is_empty() {
        return Err(cursor.error("missing sample value"));
    }
    let value = parse_value(value).ok_or_else(|| cursor.error(format!("invalid value `{value}`")))?;

    cursor.skip_whitespace();
    let timestamp = cursor.token();
    if !timestamp.is_empty() && timestamp.parse::<i64>().is_err() {
        return Err(cursor.error(format!("invalid timestamp `{timestamp}`")));
    }

    cursor.skip_whitespace();
    if cursor.peek().is_some() {
        return Err(cursor.error("trailing characters after sample"));
    }

    Ok((name, Sample { value, labels }))
}

fn parse_value(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        // `str::parse` also takes `inf`, `infinity` and `nan` in any case
        _ => raw.parse().ok().filter(|value: &f64| value.is_finite()),
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::new(self.line, reason)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), ParseError> {
        if self.peek() != Some(expected) {
            return Err(self.error(format!("expected `{}`", expected as char)));
        }
        self.pos += 1;
        Ok(())
    }

    /// Metric names may contain `:`, label names may not.
    fn name(&mut self, metric: bool) -> Result<&'a str, ParseError> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            let valid = byte.is_ascii_alphabetic()
                || byte == b'_'
                || (metric && byte == b':')
                || (self.pos > start && byte.is_ascii_digit());
            if !valid {
                break;
            }
            self.pos += 1;
        }

        if self.pos == start {
            return Err(self.error("expected a metric or label name"));
        }
        Ok(&self.text[start..self.pos])
    }

    fn token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte == b' ' || byte == b'\t' {
                break;
            }
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn labels(&mut self) -> Result<Vec<(String, String)>, ParseError> {
        self.expect(b'{')?;
        let mut labels: Vec<(String, String)> = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(labels);
            }

            let name = self.name(false)?;
            if labels.iter().any(|(existing, _)| existing == name) {
                return Err(self.error(format!("duplicate label `{name}`")));
            }

            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();
            let value = self.quoted()?;
            labels.push((name.to_string(), value));

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(labels);
                }
                _ => return Err(self.error("expected `,` or `}` after label")),
            }
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        self.expect(b'"')?;
        let mut value = String::new();
        let mut start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated label value")),
                Some(b'"') => {
                    value.push_str(&self.text[start..self.pos]);
                    self.pos += 1;
                    return Ok(value);
                }
                Some(b'\\') => {
                    value.push_str(&self.text[start..self.pos]);
                    match self.text.as_bytes().get(self.pos + 1) {
                        Some(b'\\') => value.push('\\'),
                        Some(b'"') => value.push('"'),
                        Some(b'n') => value.push('\n'),
                        _ => return Err(self.error("invalid escape sequence in label value")),
                    }
                    self.pos += 2;
                    start = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}
