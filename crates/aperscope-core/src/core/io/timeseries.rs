use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeSeriesError {
    #[error("Key '{0}' not present in the archive")]
    MissingKey(String),
    #[error("Key '{key}' has no sample at or before t = {time}")]
    NoSample { key: String, time: f64 },
    #[error("Key '{key}' holds {found} values where {expected} were expected")]
    WrongKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Snapshot file error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Snapshot JSON error for '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Series '{key}' has {timestamps} timestamps but {values} value rows")]
    Inconsistent {
        key: String,
        timestamps: usize,
        values: usize,
    },
}

/// Values recorded at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    Numbers(Vec<f64>),
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub values: SampleValues,
}

impl Sample {
    pub fn numbers(self, key: &str) -> Result<Vec<f64>, TimeSeriesError> {
        match self.values {
            SampleValues::Numbers(v) => Ok(v),
            SampleValues::Names(_) => Err(TimeSeriesError::WrongKind {
                key: key.to_string(),
                expected: "numeric",
                found: "string",
            }),
        }
    }

    pub fn names(self, key: &str) -> Result<Vec<String>, TimeSeriesError> {
        match self.values {
            SampleValues::Names(v) => Ok(v),
            SampleValues::Numbers(_) => Err(TimeSeriesError::WrongKind {
                key: key.to_string(),
                expected: "string",
                found: "numeric",
            }),
        }
    }
}

/// Point-in-time access to a measurement archive.
pub trait TimeSeriesSource {
    /// Returns the latest sample of `key` recorded at or before `time`
    /// (seconds since the Unix epoch).
    fn sample(&self, key: &str, time: f64) -> Result<Sample, TimeSeriesError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValues {
    Numbers(Vec<Vec<Option<f64>>>),
    Names(Vec<Vec<String>>),
}

#[derive(Debug, Clone, Deserialize)]
struct RawSeries {
    timestamps: Vec<f64>,
    values: RawValues,
}

/// A measurement archive extract stored as JSON:
/// `{ "<key>": { "timestamps": [...], "values": [[...], ...] } }`.
///
/// `null` numeric entries are read as `NaN`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFile {
    series: HashMap<String, RawSeries>,
}

impl SnapshotFile {
    pub fn load(path: &Path) -> Result<Self, TimeSeriesError> {
        let content = std::fs::read_to_string(path).map_err(|e| TimeSeriesError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| match e {
            TimeSeriesError::Json { source, .. } => TimeSeriesError::Json {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn parse(json: &str) -> Result<Self, TimeSeriesError> {
        let series: HashMap<String, RawSeries> =
            serde_json::from_str(json).map_err(|e| TimeSeriesError::Json {
                path: PathBuf::new(),
                source: e,
            })?;
        for (key, s) in &series {
            let values = match &s.values {
                RawValues::Numbers(v) => v.len(),
                RawValues::Names(v) => v.len(),
            };
            if values != s.timestamps.len() {
                return Err(TimeSeriesError::Inconsistent {
                    key: key.clone(),
                    timestamps: s.timestamps.len(),
                    values,
                });
            }
        }
        Ok(Self { series })
    }
}

impl TimeSeriesSource for SnapshotFile {
    fn sample(&self, key: &str, time: f64) -> Result<Sample, TimeSeriesError> {
        let series = self
            .series
            .get(key)
            .ok_or_else(|| TimeSeriesError::MissingKey(key.to_string()))?;
        let idx = series
            .timestamps
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t <= time)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .ok_or_else(|| TimeSeriesError::NoSample {
                key: key.to_string(),
                time,
            })?;
        let values = match &series.values {
            RawValues::Numbers(rows) => SampleValues::Numbers(
                rows[idx].iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
            ),
            RawValues::Names(rows) => SampleValues::Names(rows[idx].clone()),
        };
        Ok(Sample {
            timestamp: series.timestamps[idx],
            values,
        })
    }
}
