use crate::core::io::timeseries::SnapshotFile;
use crate::engine::bumps::BumpRegistry;
use crate::engine::config::FitConfig;
use crate::engine::error::EngineError;
use crate::engine::fitter::{self, BumpFit, FitResult, KnobFit};
use crate::engine::model::OpticsModel;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Where the measured orbit comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<'a> {
    pub snapshot: &'a Path,
    /// Archive time; the latest sample at or before it is used.
    pub time: f64,
}

/// Fits a single knob against the BPM readings of `measurement`.
#[instrument(skip_all, name = "knob_fit_workflow", fields(knob = %request.knob))]
pub fn knob(
    model: &mut OpticsModel,
    measurement: &Measurement,
    request: &KnobFit,
    config: &FitConfig,
    reporter: &ProgressReporter,
) -> Result<FitResult, EngineError> {
    load_measurement(model, measurement, reporter)?;

    reporter.report(Progress::PhaseStart { name: "Fitting" });
    let result = fitter::fit_knob(model, request, config, reporter);
    reporter.report(Progress::PhaseFinish);
    log_outcome(&result);
    result
}

/// Fits the amplitudes of `request.entries` against the BPM readings of
/// `measurement`. The bumps must already be applied with those amplitudes.
#[instrument(skip_all, name = "bump_fit_workflow", fields(bumps = request.entries.len()))]
pub fn bumps(
    model: &mut OpticsModel,
    registry: &BumpRegistry,
    measurement: &Measurement,
    request: &BumpFit,
    config: &FitConfig,
    reporter: &ProgressReporter,
) -> Result<FitResult, EngineError> {
    load_measurement(model, measurement, reporter)?;

    reporter.report(Progress::PhaseStart { name: "Fitting" });
    let result = fitter::fit_bumps(model, registry, request, config, reporter);
    reporter.report(Progress::PhaseFinish);
    log_outcome(&result);
    result
}

fn load_measurement(
    model: &mut OpticsModel,
    measurement: &Measurement,
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading BPM Readings",
    });
    info!(
        snapshot = %measurement.snapshot.display(),
        time = measurement.time,
        "Loading measured orbit."
    );
    let source = SnapshotFile::load(measurement.snapshot)?;
    model.load_bpm(&source, measurement.time)?;
    reporter.report(Progress::PhaseFinish);
    Ok(())
}

fn log_outcome(result: &Result<FitResult, EngineError>) {
    match result {
        Ok(fit) => info!(
            params = ?fit.params,
            uncertainties = ?fit.uncertainties,
            cost = fit.cost,
            iterations = fit.iterations,
            "Fit converged."
        ),
        Err(e) => warn!(error = %e, "Fit did not produce a result."),
    }
}
