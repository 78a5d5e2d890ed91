use crate::error::{CliError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSessionConfig {
    pub line: Option<PathBuf>,
    pub aperture: Option<PathBuf>,
    pub elements: Option<PathBuf>,
    pub collimators: Option<PathBuf>,
    pub anchor: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    pub emittance_n: Option<f64>,
    pub envelope_n: Option<f64>,
    pub length: Option<f64>,
    pub match_tolerance: Option<f64>,
    pub match_max_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileErrorBudget {
    pub delta_beta: Option<f64>,
    pub delta: Option<f64>,
    pub delta_co: Option<f64>,
    pub rtol: Option<f64>,
    pub xtol: Option<f64>,
    pub ytol: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFitConfig {
    pub max_iterations: Option<usize>,
    pub cost_tolerance: Option<f64>,
    pub step_tolerance: Option<f64>,
    pub initial_damping: Option<f64>,
}

/// Contents of a session TOML file; every table and key is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub session: FileSessionConfig,
    #[serde(default)]
    pub model: FileModelConfig,
    /// Knob values applied when the session opens, by knob name.
    #[serde(default)]
    pub knobs: BTreeMap<String, f64>,
    #[serde(default)]
    pub errors: FileErrorBudget,
    #[serde(default)]
    pub fit: FileFitConfig,
}

impl FileConfig {
    /// Reads `path` and makes its relative paths relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: FileConfig =
            toml::from_str(&content).map_err(|source| CliError::SessionFile {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(base) = path.parent() {
            config.session.rebase(base);
        }
        Ok(config)
    }

    /// Applies `-S key=value` overrides, e.g. `model.envelope-n=6` or
    /// `knobs.on_x5=160`.
    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            if let Some(knob) = key.strip_prefix("knobs.") {
                self.knobs.insert(knob.to_string(), parse_float(key, value)?);
                continue;
            }

            match key {
                "session.line" => self.session.line = Some(PathBuf::from(value)),
                "session.aperture" => self.session.aperture = Some(PathBuf::from(value)),
                "session.elements" => self.session.elements = Some(PathBuf::from(value)),
                "session.collimators" => self.session.collimators = Some(PathBuf::from(value)),
                "session.anchor" => self.session.anchor = Some(value.to_string()),
                "model.emittance-n" => self.model.emittance_n = Some(parse_float(key, value)?),
                "model.envelope-n" => self.model.envelope_n = Some(parse_float(key, value)?),
                "model.length" => self.model.length = Some(parse_float(key, value)?),
                "model.match-tolerance" => {
                    self.model.match_tolerance = Some(parse_float(key, value)?)
                }
                "model.match-max-iterations" => {
                    self.model.match_max_iterations = Some(parse_integer(key, value)?)
                }
                "errors.delta-beta" => self.errors.delta_beta = Some(parse_float(key, value)?),
                "errors.delta" => self.errors.delta = Some(parse_float(key, value)?),
                "errors.delta-co" => self.errors.delta_co = Some(parse_float(key, value)?),
                "errors.rtol" => self.errors.rtol = Some(parse_float(key, value)?),
                "errors.xtol" => self.errors.xtol = Some(parse_float(key, value)?),
                "errors.ytol" => self.errors.ytol = Some(parse_float(key, value)?),
                "fit.max-iterations" => self.fit.max_iterations = Some(parse_integer(key, value)?),
                "fit.cost-tolerance" => self.fit.cost_tolerance = Some(parse_float(key, value)?),
                "fit.step-tolerance" => self.fit.step_tolerance = Some(parse_float(key, value)?),
                "fit.initial-damping" => self.fit.initial_damping = Some(parse_float(key, value)?),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

impl FileSessionConfig {
    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.line,
            &mut self.aperture,
            &mut self.elements,
            &mut self.collimators,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid float value for {}: {}", key, value)))
}

fn parse_integer(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid integer value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SESSION_TOML: &str = r#"
        [session]
        line = "lines/ring_b1.json"
        aperture = "/data/aperture_B1.tfs"
        anchor = "ip5"

        [model]
        envelope-n = 5.0

        [knobs]
        on_x5 = 160.0

        [errors]
        delta-beta = 0.1
    "#;

    #[test]
    fn file_values_are_read_and_paths_rebased() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, SESSION_TOML).unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(
            config.session.line,
            Some(dir.path().join("lines/ring_b1.json"))
        );
        assert_eq!(
            config.session.aperture,
            Some(PathBuf::from("/data/aperture_B1.tfs"))
        );
        assert_eq!(config.session.anchor.as_deref(), Some("ip5"));
        assert_eq!(config.model.envelope_n, Some(5.0));
        assert_eq!(config.knobs.get("on_x5"), Some(&160.0));
        assert_eq!(config.errors.delta_beta, Some(0.1));
        assert_eq!(config.fit, FileFitConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, "[model]\nenvelope = 5.0\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::SessionFile { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FileConfig::from_file(&dir.path().join("absent.toml")),
            Err(CliError::Io(_))
        ));
    }

    #[test]
    fn set_values_override_file_values() {
        let mut config: FileConfig = toml::from_str(SESSION_TOML).unwrap();
        config
            .apply_set_values(&[
                "model.envelope-n=6".to_string(),
                "knobs.on_x5 = -120".to_string(),
                "fit.max-iterations=10".to_string(),
                "session.anchor=ip1".to_string(),
            ])
            .unwrap();
        assert_eq!(config.model.envelope_n, Some(6.0));
        assert_eq!(config.knobs.get("on_x5"), Some(&-120.0));
        assert_eq!(config.fit.max_iterations, Some(10));
        assert_eq!(config.session.anchor.as_deref(), Some("ip1"));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let mut config = FileConfig::default();
        for bad in ["model.envelope-n", "model.envelope-n=wide", "model.colour=red"] {
            assert!(matches!(
                config.apply_set_values(&[bad.to_string()]),
                Err(CliError::Config(_))
            ));
        }
    }
}
