use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid assignment '{0}'. Expected 'NAME=VALUE' (e.g., 'on_x5=160').")]
    InvalidAssignment(String),

    #[error("Invalid number '{value}' in '{input}'.")]
    InvalidNumber { input: String, value: String },

    #[error("Invalid range '{0}'. Expected 'LO,HI' (e.g., '9800,10200').")]
    InvalidSpan(String),
}

/// Parses `NAME=VALUE` with a numeric value, as used by `--knob`.
pub fn parse_assignment(input: &str) -> Result<(String, f64), ParseError> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidAssignment(input.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::InvalidAssignment(input.to_string()));
    }
    let value = parse_number(input, value)?;
    Ok((name.to_string(), value))
}

fn parse_number(input: &str, value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            input: input.to_string(),
            value: value.trim().to_string(),
        })
}

/// Closed interval given as `LO,HI`; the order is kept as written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub lo: f64,
    pub hi: f64,
}

impl FromStr for Span {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .split_once(',')
            .ok_or_else(|| ParseError::InvalidSpan(s.to_string()))?;
        Ok(Span {
            lo: parse_number(s, lo)?,
            hi: parse_number(s, hi)?,
        })
    }
}

impl From<Span> for (f64, f64) {
    fn from(span: Span) -> Self {
        (span.lo, span.hi)
    }
}
