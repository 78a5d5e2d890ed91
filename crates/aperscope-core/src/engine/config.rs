use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Normalised emittance used when none is given, in metres.
pub const DEFAULT_EMITTANCE_N: f64 = 3.5e-6;

fn require_finite(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("expected a finite number, got {}", value),
        })
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if require_finite(name, value)? > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if require_finite(name, value)? >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must not be negative, got {}", value),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub emittance_n: f64,
    /// Envelope half-width in units of sigma.
    pub envelope_n: f64,
    /// Ring circumference; taken from the beam-1 line when unset.
    pub length: Option<f64>,
    pub match_tolerance: f64,
    pub match_max_iterations: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            emittance_n: DEFAULT_EMITTANCE_N,
            envelope_n: 0.0,
            length: None,
            match_tolerance: 1e-10,
            match_max_iterations: 20,
        }
    }
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ModelConfigBuilder {
    emittance_n: Option<f64>,
    envelope_n: Option<f64>,
    length: Option<f64>,
    match_tolerance: Option<f64>,
    match_max_iterations: Option<usize>,
}

impl ModelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emittance_n(mut self, emittance: f64) -> Self {
        self.emittance_n = Some(emittance);
        self
    }
    pub fn envelope_n(mut self, n: f64) -> Self {
        self.envelope_n = Some(n);
        self
    }
    pub fn length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }
    pub fn match_tolerance(mut self, tolerance: f64) -> Self {
        self.match_tolerance = Some(tolerance);
        self
    }
    pub fn match_max_iterations(mut self, iterations: usize) -> Self {
        self.match_max_iterations = Some(iterations);
        self
    }

    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        let defaults = ModelConfig::default();
        Ok(ModelConfig {
            emittance_n: require_positive(
                "emittance_n",
                self.emittance_n.unwrap_or(defaults.emittance_n),
            )?,
            envelope_n: require_finite("envelope_n", self.envelope_n.unwrap_or(defaults.envelope_n))?,
            length: self
                .length
                .map(|l| require_positive("length", l))
                .transpose()?,
            match_tolerance: require_positive(
                "match_tolerance",
                self.match_tolerance.unwrap_or(defaults.match_tolerance),
            )?,
            match_max_iterations: self
                .match_max_iterations
                .unwrap_or(defaults.match_max_iterations),
        })
    }
}

/// Tolerances applied to the cross-section: beta-beating fraction, momentum
/// spread, closed-orbit tolerance and the mechanical tolerances of the
/// chamber (radial, horizontal, vertical). All default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorBudget {
    pub delta_beta: f64,
    pub delta: f64,
    pub delta_co: f64,
    pub rtol: f64,
    pub xtol: f64,
    pub ytol: f64,
}

impl ErrorBudget {
    pub fn builder() -> ErrorBudgetBuilder {
        ErrorBudgetBuilder::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Default)]
pub struct ErrorBudgetBuilder {
    budget: ErrorBudget,
}

impl ErrorBudgetBuilder {
    pub fn delta_beta(mut self, value: f64) -> Self {
        self.budget.delta_beta = value;
        self
    }
    pub fn delta(mut self, value: f64) -> Self {
        self.budget.delta = value;
        self
    }
    pub fn delta_co(mut self, value: f64) -> Self {
        self.budget.delta_co = value;
        self
    }
    pub fn rtol(mut self, value: f64) -> Self {
        self.budget.rtol = value;
        self
    }
    pub fn xtol(mut self, value: f64) -> Self {
        self.budget.xtol = value;
        self
    }
    pub fn ytol(mut self, value: f64) -> Self {
        self.budget.ytol = value;
        self
    }

    pub fn build(self) -> Result<ErrorBudget, ConfigError> {
        let b = self.budget;
        require_non_negative("delta_beta", b.delta_beta)?;
        require_non_negative("delta", b.delta)?;
        require_non_negative("delta_co", b.delta_co)?;
        require_non_negative("rtol", b.rtol)?;
        require_non_negative("xtol", b.xtol)?;
        require_non_negative("ytol", b.ytol)?;
        Ok(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub max_iterations: usize,
    /// Relative cost reduction below which the fit has converged.
    pub cost_tolerance: f64,
    /// Relative parameter step below which the fit has converged.
    pub step_tolerance: f64,
    pub initial_damping: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

impl FitConfig {
    pub fn builder() -> FitConfigBuilder {
        FitConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct FitConfigBuilder {
    max_iterations: Option<usize>,
    cost_tolerance: Option<f64>,
    step_tolerance: Option<f64>,
    initial_damping: Option<f64>,
}

impl FitConfigBuilder {
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn cost_tolerance(mut self, tolerance: f64) -> Self {
        self.cost_tolerance = Some(tolerance);
        self
    }
    pub fn step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = Some(tolerance);
        self
    }
    pub fn initial_damping(mut self, damping: f64) -> Self {
        self.initial_damping = Some(damping);
        self
    }

    pub fn build(self) -> Result<FitConfig, ConfigError> {
        let defaults = FitConfig::default();
        let max_iterations = self.max_iterations.unwrap_or(defaults.max_iterations);
        if max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(FitConfig {
            max_iterations,
            cost_tolerance: require_positive(
                "cost_tolerance",
                self.cost_tolerance.unwrap_or(defaults.cost_tolerance),
            )?,
            step_tolerance: require_positive(
                "step_tolerance",
                self.step_tolerance.unwrap_or(defaults.step_tolerance),
            )?,
            initial_damping: require_positive(
                "initial_damping",
                self.initial_damping.unwrap_or(defaults.initial_damping),
            )?,
        })
    }
}

/// Everything needed to open a ready-to-use optics model.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Beam-1 line file; the beam-2 file is derived from it.
    pub line_path: PathBuf,
    /// Beam-1 aperture table; the `B4` companion is derived from it.
    pub aperture_path: Option<PathBuf>,
    pub elements_path: Option<PathBuf>,
    pub collimators_path: Option<PathBuf>,
    pub anchor: Option<String>,
    /// Knob values written before the first twiss of the session.
    pub knobs: Vec<(String, f64)>,
    pub model: ModelConfig,
}

#[derive(Default)]
pub struct SessionConfigBuilder {
    line_path: Option<PathBuf>,
    aperture_path: Option<PathBuf>,
    elements_path: Option<PathBuf>,
    collimators_path: Option<PathBuf>,
    anchor: Option<String>,
    knobs: Vec<(String, f64)>,
    model: Option<ModelConfig>,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.line_path = Some(path.into());
        self
    }
    pub fn aperture_path(mut self, path: Option<PathBuf>) -> Self {
        self.aperture_path = path;
        self
    }
    pub fn elements_path(mut self, path: Option<PathBuf>) -> Self {
        self.elements_path = path;
        self
    }
    pub fn collimators_path(mut self, path: Option<PathBuf>) -> Self {
        self.collimators_path = path;
        self
    }
    pub fn anchor(mut self, anchor: Option<String>) -> Self {
        self.anchor = anchor;
        self
    }
    pub fn knob(mut self, name: impl Into<String>, value: f64) -> Self {
        self.knobs.push((name.into(), value));
        self
    }
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let line_path = self
            .line_path
            .ok_or(ConfigError::MissingParameter("line_path"))?;
        for (name, value) in &self.knobs {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: "knobs",
                    reason: format!("value of '{}' is not finite ({})", name, value),
                });
            }
        }
        Ok(SessionConfig {
            line_path,
            aperture_path: self.aperture_path,
            elements_path: self.elements_path,
            collimators_path: self.collimators_path,
            anchor: self.anchor,
            knobs: self.knobs,
            model: self.model.unwrap_or_default(),
        })
    }
}
