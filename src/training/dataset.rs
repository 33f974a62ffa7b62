//! CSV loading, scaling and windowing for the sequence models.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Parameter;

pub const DATE_COLUMN: &str = "Date";
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";
pub const FEATURES: usize = Parameter::ALL.len();

/// Fraction of windows used for training; the rest is validation.
pub const TRAIN_FRACTION: f64 = 0.8;

pub type Row = [f64; FEATURES];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column {0:?}")]
    MissingColumn(&'static str),

    #[error("line {line}: invalid date {value:?}")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// one complete CSV row, in `Parameter::ALL` column order
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub at: NaiveDateTime,
    pub values: Row,
}

/// Reads observations from a file. See [`read_observations`].
pub fn load_csv(path: &Path) -> Result<Vec<Observation>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })?;
    read_observations(file)
}

/// Strings read as missing, on top of the empty field.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || MISSING_MARKERS.contains(&field)
}

/// Parses a CSV with a `Date` column and one column per parameter key.
///
/// A row with a missing value in any column, including columns that are
/// otherwise ignored, is dropped, as is a row shorter than the header. The
/// result is sorted by date; rows sharing a date keep file order.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(DatasetError::MissingColumn(name))
    };
    let date_idx = column(DATE_COLUMN)?;
    let mut value_idx = [0usize; FEATURES];
    for (slot, parameter) in value_idx.iter_mut().zip(Parameter::ALL) {
        *slot = column(parameter.key())?;
    }

    let mut observations = Vec::new();
    let mut dropped = 0usize;

    'rows: for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() < headers.len() || record.iter().any(is_missing) {
            dropped += 1;
            continue;
        }
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();
        let raw_date = field(date_idx);

        let mut values = [0.0; FEATURES];
        for ((slot, idx), parameter) in values.iter_mut().zip(value_idx).zip(Parameter::ALL) {
            let raw = field(idx);
            let value: f64 = raw.parse().map_err(|_| DatasetError::InvalidValue {
                line,
                column: parameter.key(),
                value: raw.to_string(),
            })?;
            if value.is_nan() {
                dropped += 1;
                continue 'rows;
            }
            *slot = value;
        }

        let at = NaiveDateTime::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
            DatasetError::InvalidDate {
                line,
                value: raw_date.to_string(),
            }
        })?;

        observations.push(Observation { at, values });
    }

    if dropped > 0 {
        tracing::info!(dropped, kept = observations.len(), "[DATASET] dropped incomplete rows");
    }

    observations.sort_by_key(|o| o.at);
    Ok(observations)
}

// ==============================================================================
// scaling
// ==============================================================================

/// per-column min-max scaler to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        Self { min, max }
    }

    /// A constant column maps to 0.
    pub fn transform(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * (self.max - self.min) + self.min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerEntry {
    pub parameter: Parameter,
    #[serde(flatten)]
    pub scaler: MinMaxScaler,
}

/// one scaler per parameter, persisted next to the models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScalers {
    pub columns: Vec<ScalerEntry>,
}

impl FeatureScalers {
    pub fn fit(observations: &[Observation]) -> Self {
        let columns = Parameter::ALL
            .into_iter()
            .enumerate()
            .map(|(i, parameter)| ScalerEntry {
                parameter,
                scaler: MinMaxScaler::fit(observations.iter().map(|o| o.values[i])),
            })
            .collect();
        Self { columns }
    }

    pub fn transform(&self, observations: &[Observation]) -> Vec<Row> {
        observations
            .iter()
            .map(|o| {
                let mut row = o.values;
                for (value, entry) in row.iter_mut().zip(&self.columns) {
                    *value = entry.scaler.transform(*value);
                }
                row
            })
            .collect()
    }
}

// ==============================================================================
// windows
// ==============================================================================

/// `steps` consecutive rows and the row that follows them
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<Vec<f64>>,
    pub target: Vec<f64>,
}

/// Sliding windows: for `i` in `0..rows.len() - steps`, rows `i..i+steps`
/// predict row `i+steps`.
pub fn make_windows(rows: &[Row], steps: usize) -> Vec<Sample> {
    (0..rows.len().saturating_sub(steps))
        .map(|i| Sample {
            input: rows[i..i + steps].iter().map(|r| r.to_vec()).collect(),
            target: rows[i + steps].to_vec(),
        })
        .collect()
}

/// Chronological split, first `floor(TRAIN_FRACTION * n)` for training.
pub fn split(mut samples: Vec<Sample>) -> (Vec<Sample>, Vec<Sample>) {
    let train_len = (TRAIN_FRACTION * samples.len() as f64) as usize;
    let validation = samples.split_off(train_len);
    (samples, validation)
}
