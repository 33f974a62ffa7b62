//! Parsing and coercion of `/update` bodies.
//!
//! Known parameters are coerced to numbers: JSON numbers pass through,
//! strings are parsed as decimals and booleans become 1 or 0. Anything
//! else rejects the whole update.
//! Unknown keys are kept untouched.

use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};

use crate::domain::{Parameter, Reading, TIMESTAMP_FORMAT};
use crate::error::{AppError, AppResult};

/// Builds a reading from a raw request body, stamped with `received_at`.
pub fn parse_update<Tz>(body: &[u8], received_at: &DateTime<Tz>) -> AppResult<Reading>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut values = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(AppError::InvalidJson),
    };

    coerce_parameters(&mut values)?;
    values.remove("timestamp");

    Ok(Reading {
        values,
        timestamp: received_at.format(TIMESTAMP_FORMAT).to_string(),
    })
}

fn coerce_parameters(values: &mut Map<String, Value>) -> AppResult<()> {
    for parameter in Parameter::ALL {
        if let Some(raw) = values.get_mut(parameter.key()) {
            let number = coerce(raw).ok_or(AppError::InvalidValue(parameter))?;
            *raw = Value::from(number);
        }
    }
    Ok(())
}

fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    number.is_finite().then_some(number)
}
