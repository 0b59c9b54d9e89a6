// Sensor sample domain model and line decoding
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// One microcontroller reading, stamped with its arrival time at the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub value: i64,
    pub received_at: DateTime<Utc>,
    /// Firmware calibration baseline, diagnostics only
    pub baseline: Option<i64>,
    /// Firmware's own loudness verdict, diagnostics only
    pub loud: Option<bool>,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing `raw` field")]
    MissingRaw,
    #[error("`raw` is not numeric: {0}")]
    NonNumericRaw(Value),
    #[error("`raw` is not an integer: {0}")]
    NonIntegralRaw(f64),
}

impl RawSample {
    #[cfg(test)]
    pub fn new(value: i64, received_at: DateTime<Utc>) -> Self {
        Self {
            value,
            received_at,
            baseline: None,
            loud: None,
        }
    }

    /// Decode one newline-delimited frame such as `{"raw":512,"baseline":480,"loud":false}`.
    ///
    /// Only `raw` is required. Extra fields are ignored, malformed optional
    /// diagnostics are dropped rather than failing the sample.
    pub fn parse(line: &str, received_at: DateTime<Utc>) -> Result<Self, SampleError> {
        let payload: Value = serde_json::from_str(line.trim())?;
        let object = payload.as_object().ok_or(SampleError::NotAnObject)?;

        let raw = object.get("raw").ok_or(SampleError::MissingRaw)?;
        let value = integral(raw)?;

        Ok(Self {
            value,
            received_at,
            baseline: object.get("baseline").and_then(|b| integral(b).ok()),
            loud: object.get("loud").and_then(Value::as_bool),
        })
    }
}

fn integral(value: &Value) -> Result<i64, SampleError> {
    let Value::Number(number) = value else {
        return Err(SampleError::NonNumericRaw(value.clone()));
    };

    if let Some(v) = number.as_i64() {
        return Ok(v);
    }

    match number.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Some(f) => Err(SampleError::NonIntegralRaw(f)),
        None => Err(SampleError::NonNumericRaw(value.clone())),
    }
}
