//! Normalization of loosely typed numbers into exact decimals.
//!
//! Warehouse rows and hand-written configs deliver quantities and prices as
//! JSON strings, JSON numbers, or nothing at all. Everything funnels through
//! [`to_decimal`] before any arithmetic happens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    #[error("Invalid decimal value: {0:?}")]
    Invalid(String),
    #[error("Non-finite value cannot be represented as a decimal: {0}")]
    NonFinite(String),
    #[error("Unsupported value type for a decimal: {0}")]
    Unsupported(String),
}

/// A number as it arrived at the input boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawNumber {
    Exact(Decimal),
    Float(f64),
    Text(String),
    #[default]
    Missing,
}

impl From<Decimal> for RawNumber {
    fn from(d: Decimal) -> Self {
        RawNumber::Exact(d)
    }
}

impl From<f64> for RawNumber {
    fn from(f: f64) -> Self {
        RawNumber::Float(f)
    }
}

impl From<&str> for RawNumber {
    fn from(s: &str) -> Self {
        RawNumber::Text(s.to_string())
    }
}

impl<T: Into<RawNumber>> From<Option<T>> for RawNumber {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawNumber::Missing, Into::into)
    }
}

impl RawNumber {
    /// Interprets a JSON cell. Numbers keep their textual form so no binary
    /// rounding sneaks in between the wire and the decimal.
    pub fn from_json(value: Option<&Value>) -> Result<Self, DecimalError> {
        match value {
            None | Some(Value::Null) => Ok(RawNumber::Missing),
            Some(Value::String(s)) => Ok(RawNumber::Text(s.clone())),
            Some(Value::Number(n)) => Ok(RawNumber::Text(n.to_string())),
            Some(other) => Err(DecimalError::Unsupported(other.to_string())),
        }
    }
}

/// Converts a raw number into an exact decimal. Missing values become zero.
pub fn to_decimal(raw: &RawNumber) -> Result<Decimal, DecimalError> {
    match raw {
        RawNumber::Exact(d) => Ok(*d),
        RawNumber::Missing => Ok(Decimal::ZERO),
        RawNumber::Float(f) => {
            if !f.is_finite() {
                return Err(DecimalError::NonFinite(f.to_string()));
            }
            // Shortest round-trip text, so 0.1 stays 0.1
            parse_text(&f.to_string())
        }
        RawNumber::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Decimal::ZERO);
            }
            parse_text(trimmed)
        }
    }
}

fn parse_text(s: &str) -> Result<Decimal, DecimalError> {
    let parsed = if s.contains(['e', 'E']) {
        Decimal::from_scientific(s)
    } else {
        Decimal::from_str(s)
    };
    parsed
        .map(|d| d.normalize())
        .map_err(|_| DecimalError::Invalid(s.to_string()))
}
