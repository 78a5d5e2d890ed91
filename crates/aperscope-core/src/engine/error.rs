use thiserror::Error;

use super::config::ConfigError;
use super::state::KnobChange;
use crate::core::io::collimator_db::CollimatorDbError;
use crate::core::io::line::LineError;
use crate::core::io::machine::TableLoadError;
use crate::core::io::timeseries::TimeSeriesError;
use crate::core::lattice::handle::OracleError;
use crate::core::models::beam::Beam;

fn describe_pending(pending: &[KnobChange]) -> String {
    if pending.is_empty() {
        return "none".to_string();
    }
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Twiss failed for {beam}: {reason} (changes to revert: {})", describe_pending(.pending))]
    TwissFailure {
        beam: Beam,
        reason: OracleError,
        pending: Vec<KnobChange>,
    },

    #[error("Match failed: {reason} (residuals: {residuals:?})")]
    MatchFailure { reason: String, residuals: Vec<f64> },

    #[error("{0}")]
    Domain(String),

    #[error("Fit did not converge: {reason} (best: {best:?})")]
    FitNonConvergence {
        reason: String,
        best: Vec<f64>,
        uncertainties: Vec<f64>,
    },

    #[error("Fit failed at parameters {params:?}: {reason}")]
    FitFailed { params: Vec<f64>, reason: String },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Maps oracle errors raised outside a twiss, where they describe bad input.
    pub(crate) fn from_oracle(err: OracleError) -> Self {
        match err {
            OracleError::Unstable { .. } | OracleError::Singular { .. } => Self::MatchFailure {
                reason: err.to_string(),
                residuals: Vec::new(),
            },
            other => Self::Domain(other.to_string()),
        }
    }
}

impl From<TableLoadError> for EngineError {
    fn from(err: TableLoadError) -> Self {
        match err {
            TableLoadError::NotFound { .. } => Self::MissingResource(err.to_string()),
            other => Self::FormatMismatch(other.to_string()),
        }
    }
}

impl From<LineError> for EngineError {
    fn from(err: LineError) -> Self {
        match err {
            LineError::NotFound { .. } => Self::MissingResource(err.to_string()),
            other => Self::FormatMismatch(other.to_string()),
        }
    }
}

impl From<CollimatorDbError> for EngineError {
    fn from(err: CollimatorDbError) -> Self {
        match &err {
            CollimatorDbError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::MissingResource(err.to_string())
            }
            _ => Self::FormatMismatch(err.to_string()),
        }
    }
}

impl From<TimeSeriesError> for EngineError {
    fn from(err: TimeSeriesError) -> Self {
        match &err {
            TimeSeriesError::MissingKey(_) | TimeSeriesError::NoSample { .. } => {
                Self::MissingResource(err.to_string())
            }
            TimeSeriesError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::MissingResource(err.to_string())
            }
            _ => Self::FormatMismatch(err.to_string()),
        }
    }
}
