use crate::core::lattice::expr::LinearExpr;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("Line file '{path}' not found")]
    NotFound { path: PathBuf },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parsing error for '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unsupported line file extension for '{path}' (expected .json)")]
    UnsupportedExtension { path: PathBuf },
    #[error("Invalid line description: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Marker,
    Drift,
    Monitor,
    Quadrupole,
    Sbend,
    Rbend,
    Sextupole,
    Hkicker,
    Vkicker,
    Kicker,
    Collimator,
    Aperture,
}

/// Reference particle. Either `gamma0` or both energies must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleSpec {
    pub gamma0: Option<f64>,
    pub energy_gev: Option<f64>,
    pub mass_gev: Option<f64>,
}

impl ParticleSpec {
    pub fn gamma0(&self) -> Result<f64, LineError> {
        let gamma = match (self.gamma0, self.energy_gev, self.mass_gev) {
            (Some(g), _, _) => g,
            (None, Some(e), Some(m)) if m > 0.0 => e / m,
            _ => {
                return Err(LineError::Invalid(
                    "particle needs 'gamma0' or 'energy_gev' with 'mass_gev'".to_string(),
                ));
            }
        };
        if !gamma.is_finite() || gamma < 1.0 {
            return Err(LineError::Invalid(format!(
                "relativistic gamma must be >= 1 (got {})",
                gamma
            )));
        }
        Ok(gamma)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    pub name: String,
    pub s: f64,
    #[serde(default)]
    pub length: f64,
    pub kind: ElementKind,
    #[serde(default)]
    pub k1l: LinearExpr,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub hkick: LinearExpr,
    #[serde(default)]
    pub vkick: LinearExpr,
}

/// On-disk description of one beam line.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineFile {
    #[serde(default)]
    pub name: String,
    pub length: Option<f64>,
    pub particle: ParticleSpec,
    #[serde(default)]
    pub vars: BTreeMap<String, f64>,
    pub elements: Vec<ElementSpec>,
}

impl LineFile {
    pub fn load(path: &Path) -> Result<Self, LineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if extension.as_deref() != Some("json") {
            return Err(LineError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LineError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LineError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&content).map_err(|e| LineError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Path of the beam-2 line that accompanies a beam-1 line file.
pub fn companion_line_path(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    path.with_file_name(file_name.replace("b1", "b2").replace("B1", "B2"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const LINE: &str = r#"{
        "name": "ring_b1",
        "length": 100.0,
        "particle": {"energy_gev": 450.0, "mass_gev": 0.938272},
        "vars": {"kqf": 0.1, "acbh1": 0.0},
        "elements": [
            {"name": "ip1", "s": 0.0, "kind": "marker"},
            {"name": "mq.1", "s": 10.0, "kind": "quadrupole", "k1l": {"terms": {"kqf": 1.0}}},
            {"name": "mcbh.1", "s": 20.0, "kind": "hkicker", "hkick": {"constant": 1e-6, "terms": {"acbh1": 1.0}}},
            {"name": "mb.1", "s": 30.0, "length": 14.3, "kind": "sbend", "angle": 0.01}
        ]
    }"#;

    #[test]
    fn parses_line_with_expressions() {
        let line: LineFile = serde_json::from_str(LINE).unwrap();
        assert_eq!(line.elements.len(), 4);
        assert_eq!(line.elements[1].kind, ElementKind::Quadrupole);
        assert_eq!(line.elements[2].hkick.constant, 1e-6);
        assert!((line.particle.gamma0().unwrap() - 450.0 / 0.938272).abs() < 1e-9);
    }

    #[test]
    fn particle_without_energy_is_invalid() {
        let particle = ParticleSpec {
            gamma0: None,
            energy_gev: Some(450.0),
            mass_gev: None,
        };
        assert!(matches!(particle.gamma0(), Err(LineError::Invalid(_))));
    }

    #[test]
    fn load_distinguishes_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LineFile::load(&dir.path().join("absent_b1.json")),
            Err(LineError::NotFound { .. })
        ));
        let bad = dir.path().join("bad_b1.json");
        fs::write(&bad, "{\"elements\": 3}").unwrap();
        assert!(matches!(LineFile::load(&bad), Err(LineError::Json { .. })));
        let ok = dir.path().join("ring_b1.json");
        fs::write(&ok, LINE).unwrap();
        assert!(LineFile::load(&ok).is_ok());
    }

    #[test]
    fn companion_path_substitutes_beam_number() {
        assert_eq!(
            companion_line_path(Path::new("/lines/b1/injection_b1.json")),
            PathBuf::from("/lines/b1/injection_b2.json")
        );
    }
}
