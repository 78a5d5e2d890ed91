use crate::core::models::beam::Plane;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("One-turn map is unstable in the {plane} plane (cos mu = {cos_mu:.6})")]
    Unstable { plane: Plane, cos_mu: f64 },
    #[error("Closed orbit cannot be solved in the {plane} plane (singular one-turn map)")]
    Singular { plane: Plane },
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Non-finite value {value} for variable '{name}'")]
    NonFinite { name: String, value: f64 },
    #[error("Match request is empty: {0}")]
    EmptyMatch(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TwissOptions {
    /// Express the result in the opposite direction of travel.
    pub reverse: bool,
    pub skip_global_quantities: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TwissRow {
    pub name: String,
    pub s: f64,
    pub x: f64,
    pub px: f64,
    pub y: f64,
    pub py: f64,
    pub betx: f64,
    pub bety: f64,
    pub alfx: f64,
    pub alfy: f64,
    pub mux: f64,
    pub muy: f64,
    pub dx: f64,
    pub dpx: f64,
    pub dy: f64,
    pub dpy: f64,
}

impl TwissRow {
    pub fn quantity(&self, quantity: OrbitQuantity) -> f64 {
        match quantity {
            OrbitQuantity::X => self.x,
            OrbitQuantity::Px => self.px,
            OrbitQuantity::Y => self.y,
            OrbitQuantity::Py => self.py,
        }
    }
}

/// Result of one twiss evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TwissTable {
    pub rows: Vec<TwissRow>,
    pub length: f64,
    /// Tunes; `None` when global quantities were skipped.
    pub qx: Option<f64>,
    pub qy: Option<f64>,
}

impl TwissTable {
    pub fn find(&self, name: &str) -> Option<(usize, &TwissRow)> {
        self.rows.iter().enumerate().find(|(_, r)| r.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitQuantity {
    X,
    Px,
    Y,
    Py,
}

impl OrbitQuantity {
    pub fn position(plane: Plane) -> Self {
        match plane {
            Plane::Horizontal => Self::X,
            Plane::Vertical => Self::Y,
        }
    }

    pub fn angle(plane: Plane) -> Self {
        match plane {
            Plane::Horizontal => Self::Px,
            Plane::Vertical => Self::Py,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchTarget {
    pub element: String,
    pub quantity: OrbitQuantity,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub targets: Vec<MatchTarget>,
    pub vary: Vec<String>,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub converged: bool,
    pub iterations: usize,
    /// Final value per varied knob, in request order.
    pub values: Vec<(String, f64)>,
    /// `achieved - target` per target, in request order.
    pub residuals: Vec<f64>,
}

/// One beam's lattice as seen by the optics model.
///
/// Implementations own the knob values; every twiss reflects the values set
/// before it was called.
pub trait LineHandle {
    fn name(&self) -> &str;

    fn twiss(&self, options: &TwissOptions) -> Result<TwissTable, OracleError>;

    fn var(&self, name: &str) -> Option<f64>;

    fn set_var(&mut self, name: &str, value: f64) -> Result<(), OracleError>;

    /// Names of every knob, sorted.
    fn knobs(&self) -> Vec<String>;

    /// Element names whose strengths depend on `knob`.
    fn dependent_elements(&self, knob: &str) -> Vec<String>;

    fn gamma0(&self) -> f64;

    fn length(&self) -> f64;

    /// Solves for the `vary` knobs so that the targets are met. When the
    /// solver does not converge the knobs keep their previous values.
    fn match_targets(&mut self, request: &MatchRequest) -> Result<MatchOutcome, OracleError>;
}
