use crate::core::models::beam::{Beam, BeamPair};
use crate::core::models::collimator::CollimatorSetting;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollimatorDbError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parsing error for '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Unsupported collimator database extension for '{path}' (expected .yaml or .yml)")]
    UnsupportedExtension { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct RawCollimator {
    gap: Option<f64>,
    #[serde(default)]
    angle: f64,
}

#[derive(Debug, Deserialize)]
struct RawBeams {
    #[serde(default)]
    b1: BTreeMap<String, RawCollimator>,
    #[serde(default)]
    b2: BTreeMap<String, RawCollimator>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    collimators: RawBeams,
}

/// Collimator settings per beam, as read from a collimator database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollimatorDatabase {
    pub settings: BeamPair<Vec<CollimatorSetting>>,
}

impl CollimatorDatabase {
    pub fn load(path: &Path) -> Result<Self, CollimatorDbError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if !matches!(extension.as_deref(), Some("yaml") | Some("yml")) {
            return Err(CollimatorDbError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| CollimatorDbError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| CollimatorDbError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let raw: RawDatabase = serde_yaml::from_str(yaml)?;
        let convert = |entries: BTreeMap<String, RawCollimator>| -> Vec<CollimatorSetting> {
            entries
                .into_iter()
                .filter_map(|(name, raw)| {
                    raw.gap.map(|gap| CollimatorSetting {
                        name: name.to_ascii_lowercase(),
                        gap,
                        angle: raw.angle,
                    })
                })
                .collect()
        };
        Ok(Self {
            settings: BeamPair::new(convert(raw.collimators.b1), convert(raw.collimators.b2)),
        })
    }

    pub fn beam(&self, beam: Beam) -> &[CollimatorSetting] {
        self.settings.get(beam)
    }
}
