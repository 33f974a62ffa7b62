use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire format of the server-side reading timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// water-quality parameters the relay knows safe ranges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    #[serde(rename = "TEMP")]
    Temperature,
    #[serde(rename = "PH")]
    Ph,
    #[serde(rename = "AMMONIA")]
    Ammonia,
    #[serde(rename = "DO")]
    DissolvedOxygen,
    #[serde(rename = "TURBIDITY")]
    Turbidity,
}

impl Parameter {
    /// All parameters, in alerting order.
    pub const ALL: [Parameter; 5] = [
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::Ammonia,
        Parameter::DissolvedOxygen,
        Parameter::Turbidity,
    ];

    /// key used by the ESP32 payload and the training CSV
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Temperature => "TEMP",
            Parameter::Ph => "PH",
            Parameter::Ammonia => "AMMONIA",
            Parameter::DissolvedOxygen => "DO",
            Parameter::Turbidity => "TURBIDITY",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Inclusive safe bounds. Fixed for the lifetime of the process.
    pub fn safe_range(self) -> SafeRange {
        match self {
            Parameter::Temperature => SafeRange::new(20.0, 30.0),
            Parameter::Ph => SafeRange::new(6.5, 8.5),
            Parameter::Ammonia => SafeRange::new(0.0, 0.5),
            Parameter::DissolvedOxygen => SafeRange::new(5.0, 10.0),
            Parameter::Turbidity => SafeRange::new(0.0, 50.0),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// inclusive (low, high) bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeRange {
    pub low: f64,
    pub high: f64,
}

impl SafeRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// the single most recent sample posted by the sensor node
///
/// `values` holds every key the device sent. Known parameters are always
/// stored as JSON numbers; unknown keys are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(flatten)]
    pub values: Map<String, Value>,
    /// server-side receive time, `TIMESTAMP_FORMAT`
    pub timestamp: String,
}

impl Reading {
    /// Numeric value of a known parameter, if the device sent it.
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.values.get(parameter.key()).and_then(Value::as_f64)
    }

    /// (parameter, value) pairs for every known parameter present.
    pub fn parameter_values(&self) -> Vec<(Parameter, f64)> {
        Parameter::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|v| (p, v)))
            .collect()
    }
}
