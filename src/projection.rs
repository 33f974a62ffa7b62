//! Constant-factor "prediction".
//!
//! This is not a forecast: the latest reading is scaled by
//! [`PROJECTION_FACTOR`] and rounded. The LSTM models produced by
//! `pond-trainer` are not consulted.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{Parameter, Reading};

pub const PROJECTION_FACTOR: f64 = 1.1;

/// supported projection intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Horizon {
    #[serde(rename = "6hr")]
    SixHours,
    #[serde(rename = "12hr")]
    TwelveHours,
}

impl Horizon {
    pub const ALL: [Horizon; 2] = [Horizon::SixHours, Horizon::TwelveHours];

    pub fn label(self) -> &'static str {
        match self {
            Horizon::SixHours => "6hr",
            Horizon::TwelveHours => "12hr",
        }
    }

    /// Number of samples in a training window for this horizon
    /// (one sample every 20 minutes).
    pub fn window_steps(self) -> usize {
        match self {
            Horizon::SixHours => 18,
            Horizon::TwelveHours => 36,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownHorizon(pub String);

impl FromStr for Horizon {
    type Err = UnknownHorizon;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.label() == s)
            .ok_or_else(|| UnknownHorizon(s.to_string()))
    }
}

/// scaled copy of the numeric fields of a reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub interval: Horizon,
    pub predictions: Map<String, Value>,
}

impl Projection {
    pub fn parameter_values(&self) -> Vec<(Parameter, f64)> {
        Parameter::ALL
            .into_iter()
            .filter_map(|p| {
                self.predictions
                    .get(p.key())
                    .and_then(Value::as_f64)
                    .map(|v| (p, v))
            })
            .collect()
    }
}

/// Multiplies every numeric field by [`PROJECTION_FACTOR`], rounded to two
/// decimals. Booleans count as 1 and 0; other non-numeric fields are dropped.
///
/// A product past `f64::MAX` is clamped to `±f64::MAX` so it still
/// serializes as a number and still trips the range check.
pub fn project(reading: &Reading, interval: Horizon) -> Projection {
    let predictions = reading
        .values
        .iter()
        .filter_map(|(key, value)| {
            let scaled = scale(numeric(value)?);
            Some((key.clone(), Value::from(scaled)))
        })
        .collect();

    Projection {
        interval,
        predictions,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    }
}

fn scale(value: f64) -> f64 {
    let scaled = value * PROJECTION_FACTOR;
    if scaled.is_finite() {
        round2(scaled)
    } else {
        f64::MAX.copysign(scaled)
    }
}

/// Halves round away from zero (`f64::round`), not to even.
fn round2(value: f64) -> f64 {
    let shifted = value * 100.0;
    if !shifted.is_finite() {
        // already far beyond two-decimal precision
        return value;
    }
    shifted.round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(values: Value) -> Reading {
        Reading {
            values: values.as_object().cloned().unwrap(),
            timestamp: "2025-03-01 08:00:00".into(),
        }
    }

    #[test]
    fn parses_known_intervals_only() {
        assert_eq!("6hr".parse::<Horizon>(), Ok(Horizon::SixHours));
        assert_eq!("12hr".parse::<Horizon>(), Ok(Horizon::TwelveHours));
        assert_eq!(
            "24hr".parse::<Horizon>(),
            Err(UnknownHorizon("24hr".into()))
        );
    }

    #[test]
    fn scales_and_rounds_numeric_fields() {
        let r = reading(json!({"TEMP": 25.0, "PH": 7.33, "DO": 6, "node": "esp32-a"}));

        let p = project(&r, Horizon::SixHours);

        assert_eq!(p.predictions["TEMP"], json!(27.5));
        assert_eq!(p.predictions["PH"], json!(8.06));
        assert_eq!(p.predictions["DO"], json!(6.6));
        assert!(!p.predictions.contains_key("node"));
        assert!(!p.predictions.contains_key("timestamp"));
    }

    #[test]
    fn projection_serializes_with_interval_label() {
        let r = reading(json!({"AMMONIA": 0.2}));
        let json = serde_json::to_value(project(&r, Horizon::TwelveHours)).unwrap();
        assert_eq!(json, json!({"interval": "12hr", "predictions": {"AMMONIA": 0.22}}));
    }

    #[test]
    fn huge_values_stay_numeric() {
        let r = reading(json!({"TURBIDITY": 1e307, "TEMP": -1.7e308}));

        let p = project(&r, Horizon::SixHours);

        assert_eq!(p.predictions["TURBIDITY"], json!(1e307 * 1.1));
        assert_eq!(p.predictions["TEMP"], json!(-f64::MAX));
        assert_eq!(
            p.parameter_values(),
            vec![(Parameter::Temperature, -f64::MAX), (Parameter::Turbidity, 1e307 * 1.1)]
        );
    }

    #[test]
    fn booleans_scale_as_one_and_zero() {
        let r = reading(json!({"pump_on": true, "heater_on": false}));

        let p = project(&r, Horizon::TwelveHours);

        assert_eq!(p.predictions["pump_on"], json!(1.1));
        assert_eq!(p.predictions["heater_on"], json!(0.0));
    }

    #[test]
    fn window_steps_match_horizon() {
        assert_eq!(Horizon::SixHours.window_steps(), 18);
        assert_eq!(Horizon::TwelveHours.window_steps(), 36);
    }
}
