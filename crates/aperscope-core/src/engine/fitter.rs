use super::bumps::BumpRegistry;
use super::config::FitConfig;
use super::error::EngineError;
use super::model::OpticsModel;
use super::progress::{Progress, ProgressReporter};
use crate::core::lattice::handle::LineHandle;
use crate::core::models::beam::{Beam, Plane};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;

/// Outcome of a converged bounded least-squares fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub params: Vec<f64>,
    /// One standard deviation per parameter, from the residual-weighted
    /// covariance at the optimum.
    pub uncertainties: Vec<f64>,
    /// Sum of squared residuals at the optimum.
    pub cost: f64,
    pub iterations: usize,
    pub residuals: Vec<f64>,
}

/// A measured orbit position used as a fit target.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub s: f64,
    pub value: f64,
}

fn evaluate<F>(f: &mut F, x: &DVector<f64>) -> Result<DVector<f64>, EngineError>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, EngineError>,
{
    let params = x.as_slice();
    let fail = |reason: String| {
        error!(params = ?params, %reason, "Model evaluation failed during fit.");
        EngineError::FitFailed {
            params: params.to_vec(),
            reason,
        }
    };
    let r = f(params).map_err(|e| fail(e.to_string()))?;
    if r.iter().any(|v| !v.is_finite()) {
        return Err(fail("model returned non-finite residuals".to_string()));
    }
    Ok(DVector::from_vec(r))
}

fn clamp(x: DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(bounds).map(|(&v, &(lo, hi))| v.clamp(lo, hi)),
    )
}

fn jacobian<F>(
    f: &mut F,
    x: &DVector<f64>,
    r: &DVector<f64>,
    bounds: &[(f64, f64)],
) -> Result<DMatrix<f64>, EngineError>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, EngineError>,
{
    let mut j = DMatrix::zeros(r.len(), x.len());
    for k in 0..x.len() {
        let mut h = 1e-6 * x[k].abs().max(1.0);
        if x[k] + h > bounds[k].1 {
            h = -h;
        }
        let mut stepped = x.clone();
        stepped[k] += h;
        let rk = evaluate(f, &stepped)?;
        if rk.len() != r.len() {
            return Err(EngineError::Internal(format!(
                "residual length changed from {} to {}",
                r.len(),
                rk.len()
            )));
        }
        j.set_column(k, &((rk - r) / h));
    }
    Ok(j)
}

/// `sqrt(diag((J^T J)^-1) * cost / (m - n))`, or `None` when undetermined.
fn uncertainties(j: &DMatrix<f64>, cost: f64) -> Option<Vec<f64>> {
    let (m, n) = j.shape();
    if m <= n {
        return None;
    }
    let covariance = (j.transpose() * j).try_inverse()?;
    let scale = cost / (m - n) as f64;
    let sigmas: Vec<f64> = (0..n)
        .map(|i| (covariance[(i, i)] * scale).max(0.0).sqrt())
        .collect();
    sigmas.iter().all(|s| s.is_finite()).then_some(sigmas)
}

fn non_convergence(reason: impl Into<String>, best: &DVector<f64>, sigmas: Vec<f64>) -> EngineError {
    let reason = reason.into();
    warn!(%reason, best = ?best.as_slice(), "Fit did not converge.");
    EngineError::FitNonConvergence {
        reason,
        best: best.iter().copied().collect(),
        uncertainties: sigmas,
    }
}

/// Minimises the sum of squared `residuals` within `bounds` by projected
/// Levenberg-Marquardt.
///
/// Fails with [`EngineError::FitFailed`] as soon as the model cannot be
/// evaluated, and with [`EngineError::FitNonConvergence`] when the optimum
/// sits on a bound, the cost stops decreasing, the iteration limit is reached
/// or the uncertainties are undetermined.
pub fn least_squares<F>(
    mut residuals: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    config: &FitConfig,
    reporter: &ProgressReporter,
) -> Result<FitResult, EngineError>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, EngineError>,
{
    let n = initial.len();
    if n == 0 {
        return Err(EngineError::Domain("fit has no parameters".to_string()));
    }
    if bounds.len() != n {
        return Err(EngineError::Domain(format!(
            "{} bounds given for {} parameters",
            bounds.len(),
            n
        )));
    }
    if let Some((lo, hi)) = bounds.iter().find(|(lo, hi)| !(lo <= hi)) {
        return Err(EngineError::Domain(format!(
            "invalid bounds [{}, {}]",
            lo, hi
        )));
    }

    let mut x = clamp(DVector::from_column_slice(initial), bounds);
    let mut r = evaluate(&mut residuals, &x)?;
    if r.is_empty() {
        return Err(EngineError::Domain("fit has no observations".to_string()));
    }
    let mut cost = r.norm_squared();
    let mut lambda = config.initial_damping;
    let mut converged = false;
    let mut stalled = false;
    let mut iterations = 0;

    reporter.report(Progress::TaskStart {
        total_steps: config.max_iterations as u64,
    });
    while iterations < config.max_iterations && !converged && !stalled {
        iterations += 1;
        if cost == 0.0 {
            converged = true;
            break;
        }
        let j = jacobian(&mut residuals, &x, &r, bounds)?;
        if j.iter().all(|v| *v == 0.0) {
            reporter.report(Progress::TaskFinish);
            return Err(non_convergence(
                "model does not depend on the parameters",
                &x,
                vec![f64::NAN; n],
            ));
        }
        let a = j.transpose() * &j;
        let g = j.transpose() * &r;
        let floor = a.diagonal().max() * f64::EPSILON;

        loop {
            let mut damped = a.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * a[(i, i)].max(floor);
            }
            let Some(delta) = damped.cholesky().map(|c| c.solve(&(-&g))) else {
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    stalled = true;
                    break;
                }
                continue;
            };
            let candidate = clamp(&x + delta, bounds);
            let step = (&candidate - &x).norm();
            if step <= config.step_tolerance * (x.norm() + config.step_tolerance) {
                converged = true;
                break;
            }
            let r_new = evaluate(&mut residuals, &candidate)?;
            let cost_new = r_new.norm_squared();
            if cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                x = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(MIN_DAMPING);
                converged = reduction <= config.cost_tolerance || cost == 0.0;
                break;
            }
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                stalled = true;
                break;
            }
        }
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::FitStep {
            iteration: iterations,
            cost,
        });
    }
    reporter.report(Progress::TaskFinish);

    let j = jacobian(&mut residuals, &x, &r, bounds)?;
    let sigmas = uncertainties(&j, cost);
    let sigmas_or_nan = sigmas.clone().unwrap_or_else(|| vec![f64::NAN; n]);

    if !converged {
        let reason = if stalled {
            "residual unchanged".to_string()
        } else {
            format!("no convergence after {} iterations", iterations)
        };
        return Err(non_convergence(reason, &x, sigmas_or_nan));
    }
    if let Some(k) = (0..n).find(|&k| x[k] == bounds[k].0 || x[k] == bounds[k].1) {
        return Err(non_convergence(
            format!("parameter {} stopped on its bound at {}", k, x[k]),
            &x,
            sigmas_or_nan,
        ));
    }
    let Some(sigmas) = sigmas else {
        return Err(non_convergence(
            format!(
                "uncertainties undetermined ({} observations, {} parameters)",
                r.len(),
                n
            ),
            &x,
            sigmas_or_nan,
        ));
    };

    info!(iterations, cost, "Fit converged.");
    Ok(FitResult {
        params: x.iter().copied().collect(),
        uncertainties: sigmas,
        cost,
        iterations,
        residuals: r.iter().copied().collect(),
    })
}

/// BPM readings of `beam` in `plane` whose position lies in `window`.
pub fn observations<L: LineHandle>(
    model: &OpticsModel<L>,
    beam: Beam,
    plane: Plane,
    window: (f64, f64),
) -> Result<Vec<Observation>, EngineError> {
    let (s_min, s_max) = window;
    if s_min > s_max {
        return Err(EngineError::Domain(format!(
            "window [{}, {}] straddles the origin; cycle the model first",
            s_min, s_max
        )));
    }
    let bpm = model.bpm(beam).ok_or_else(|| {
        EngineError::Domain("BPM readings must be loaded before fitting".to_string())
    })?;
    let observations: Vec<Observation> = bpm
        .window(s_min, s_max)
        .map(|row| Observation {
            name: row.name.clone(),
            s: row.s,
            value: row.position(plane),
        })
        .collect();
    if observations.is_empty() {
        return Err(EngineError::Domain(format!(
            "no BPM of {} in [{}, {}]",
            beam, s_min, s_max
        )));
    }
    Ok(observations)
}

fn orbit_residuals<L: LineHandle>(
    model: &mut OpticsModel<L>,
    beam: Beam,
    plane: Plane,
    observations: &[Observation],
) -> Result<Vec<f64>, EngineError> {
    model.twiss()?;
    let optics = model.snapshot(beam);
    observations
        .iter()
        .map(|o| {
            optics
                .get(&o.name)
                .map(|row| o.value - row.orbit(plane))
                .ok_or_else(|| {
                    EngineError::Internal(format!("BPM '{}' vanished from the optics", o.name))
                })
        })
        .collect()
}

/// Single-knob fit of the closed orbit to the BPM readings in a window.
#[derive(Debug, Clone, PartialEq)]
pub struct KnobFit {
    pub knob: String,
    pub beam: Beam,
    pub plane: Plane,
    pub guess: f64,
    pub bounds: (f64, f64),
    pub window: (f64, f64),
}

/// Fits `request.knob` and leaves it at the best value found. When the model
/// cannot be evaluated the knob is restored to its value before the fit.
pub fn fit_knob<L: LineHandle>(
    model: &mut OpticsModel<L>,
    request: &KnobFit,
    config: &FitConfig,
    reporter: &ProgressReporter,
) -> Result<FitResult, EngineError> {
    model.ensure_fresh()?;
    let observations = observations(model, request.beam, request.plane, request.window)?;
    let original = model
        .knob(&request.knob)
        .map(|k| k.current)
        .ok_or_else(|| EngineError::Domain(format!("unknown knob '{}'", request.knob)))?;
    info!(
        knob = %request.knob,
        beam = %request.beam,
        plane = %request.plane,
        observations = observations.len(),
        "Fitting knob to BPM readings."
    );

    let result = least_squares(
        |p| {
            model.change_knob(&request.knob, p[0])?;
            orbit_residuals(model, request.beam, request.plane, &observations)
        },
        &[request.guess],
        &[request.bounds],
        config,
        reporter,
    );

    let settle = match &result {
        Ok(fit) => Some(fit.params[0]),
        Err(EngineError::FitNonConvergence { best, .. }) => best.first().copied(),
        Err(_) => Some(original),
    };
    if let Some(value) = settle {
        model.change_knob(&request.knob, value)?;
        if let Err(e) = model.twiss() {
            warn!(error = %e, "Twiss failed while settling the fitted knob.");
        }
    }
    result
}

/// Fit of the amplitudes of bumps already applied to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BumpFit {
    /// Bump names and the amplitudes currently applied, used as initial guess.
    pub entries: Vec<(String, f64)>,
    pub beam: Beam,
    pub plane: Plane,
    pub window: (f64, f64),
    /// Per-entry bounds; unbounded when absent.
    pub bounds: Option<Vec<(f64, f64)>>,
}

/// Fits bump amplitudes to the BPM readings. Corrector strengths end at the
/// best amplitudes, or back at their values before the fit when the model
/// cannot be evaluated.
pub fn fit_bumps<L: LineHandle>(
    model: &mut OpticsModel<L>,
    registry: &BumpRegistry,
    request: &BumpFit,
    config: &FitConfig,
    reporter: &ProgressReporter,
) -> Result<FitResult, EngineError> {
    model.ensure_fresh()?;
    let observations = observations(model, request.beam, request.plane, request.window)?;
    let names: Vec<&str> = request.entries.iter().map(|(n, _)| n.as_str()).collect();
    let initial: Vec<f64> = request.entries.iter().map(|(_, a)| *a).collect();
    let bounds = request
        .bounds
        .clone()
        .unwrap_or_else(|| vec![(f64::NEG_INFINITY, f64::INFINITY); initial.len()]);

    let applied = registry.contributions(&pairs(&names, &initial))?;
    let mut original = BTreeMap::new();
    let mut base = BTreeMap::new();
    for ((beam, corrector), delta) in &applied {
        let current = model.line(*beam).var(corrector).ok_or_else(|| {
            EngineError::Domain(format!("unknown corrector '{}' on {}", corrector, beam))
        })?;
        original.insert((*beam, corrector.clone()), current);
        base.insert((*beam, corrector.clone()), current - delta);
    }
    info!(
        bumps = names.len(),
        correctors = base.len(),
        observations = observations.len(),
        "Fitting bump amplitudes to BPM readings."
    );

    let write = |model: &mut OpticsModel<L>, amplitudes: &[f64]| -> Result<(), EngineError> {
        let deltas = registry.contributions(&pairs(&names, amplitudes))?;
        for ((beam, corrector), value) in &base {
            let delta = deltas
                .get(&(*beam, corrector.clone()))
                .copied()
                .unwrap_or(0.0);
            model.change_acb_knob(corrector, value + delta, *beam)?;
        }
        Ok(())
    };

    let result = least_squares(
        |p| {
            write(model, p)?;
            orbit_residuals(model, request.beam, request.plane, &observations)
        },
        &initial,
        &bounds,
        config,
        reporter,
    );

    match &result {
        Ok(fit) => write(model, &fit.params)?,
        Err(EngineError::FitNonConvergence { best, .. }) if best.len() == names.len() => {
            write(model, best)?
        }
        Err(_) => {
            for ((beam, corrector), value) in &original {
                model.change_acb_knob(corrector, *value, *beam)?;
            }
        }
    }
    if let Err(e) = model.twiss() {
        warn!(error = %e, "Twiss failed while settling the fitted bumps.");
    }
    result
}

fn pairs<'a>(names: &[&'a str], amplitudes: &[f64]) -> Vec<(&'a str, f64)> {
    names.iter().copied().zip(amplitudes.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::timeseries::SnapshotFile;
    use crate::engine::testing;

    const T: [f64; 4] = [0.0, 1.0, 2.0, 3.0];
    const NOISE: [f64; 4] = [1.0, -1.0, -1.0, 1.0];

    fn line_residuals(p: &[f64]) -> Result<Vec<f64>, EngineError> {
        Ok(T.iter()
            .zip(NOISE)
            .map(|(t, n)| (1.0 + 2.0 * t + 0.01 * n) - (p[0] + p[1] * t))
            .collect())
    }

    fn unbounded() -> Vec<(f64, f64)> {
        vec![(f64::NEG_INFINITY, f64::INFINITY); 2]
    }

    #[test]
    fn linear_fit_recovers_parameters_within_uncertainty() {
        let fit = least_squares(
            line_residuals,
            &[0.0, 0.0],
            &unbounded(),
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!((fit.params[0] - 1.0).abs() <= fit.uncertainties[0]);
        assert!((fit.params[1] - 2.0).abs() <= fit.uncertainties[1]);
        assert!((fit.cost - 4e-4).abs() < 1e-10);
        assert!(fit.uncertainties.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn optimum_on_a_bound_does_not_converge() {
        let err = least_squares(
            line_residuals,
            &[0.0, 0.0],
            &[(f64::NEG_INFINITY, f64::INFINITY), (0.0, 1.5)],
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        match err {
            EngineError::FitNonConvergence { best, .. } => assert_eq!(best[1], 1.5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn more_parameters_than_observations_leave_uncertainties_undetermined() {
        let err = least_squares(
            |p: &[f64]| Ok(vec![1.0 - p[0] - p[1]]),
            &[0.0, 0.0],
            &unbounded(),
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        match err {
            EngineError::FitNonConvergence { uncertainties, .. } => {
                assert!(uncertainties.iter().all(|s| s.is_nan()))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn evaluation_failure_reports_the_parameters() {
        let err = least_squares(
            |p: &[f64]| {
                if p[0] > 5.0 {
                    Err(EngineError::Domain("unstable".into()))
                } else {
                    line_residuals(p)
                }
            },
            &[10.0, 0.0],
            &unbounded(),
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        match err {
            EngineError::FitFailed { params, reason } => {
                assert_eq!(params, vec![10.0, 0.0]);
                assert!(reason.contains("unstable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn constant_model_is_rejected() {
        let err = least_squares(
            |_: &[f64]| Ok(vec![1.0, 2.0]),
            &[0.0],
            &[(f64::NEG_INFINITY, f64::INFINITY)],
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::FitNonConvergence { .. }));
    }

    #[test]
    fn invalid_bounds_are_domain_errors() {
        let err = least_squares(
            line_residuals,
            &[0.0, 0.0],
            &[(1.0, 0.0), (0.0, 1.0)],
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));
    }

    fn measured(model: &mut OpticsModel) -> SnapshotFile {
        model.twiss().unwrap();
        testing::bpm_snapshot(model, 100.0)
    }

    #[test]
    fn knob_fit_recovers_the_measured_setting() {
        let mut model = testing::model();
        model.change_knob("on_x5", 40.0).unwrap();
        let snapshot = measured(&mut model);
        model.change_knob("on_x5", 0.0).unwrap();
        model.load_bpm(&snapshot, 150.0).unwrap();

        let window = model.get_ir_boundries(Beam::B1, 5).unwrap();
        let request = KnobFit {
            knob: "on_x5".into(),
            beam: Beam::B1,
            plane: Plane::Vertical,
            guess: 0.0,
            bounds: (-100.0, 100.0),
            window,
        };
        let fit = fit_knob(
            &mut model,
            &request,
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!((fit.params[0] - 40.0).abs() < 1e-6);
        assert!((model.knob("on_x5").unwrap().current - fit.params[0]).abs() < 1e-12);
    }

    /// Vertical readings of the beam-1 monitors, in millimetres, with their
    /// positions in the archive document.
    fn vertical_b1(document: &serde_json::Value) -> Vec<(usize, f64)> {
        let names = document["BFC.LHC:Mappings:fBPMNames_h"]["values"][0].as_array().unwrap();
        let values = document["BFC.LHC:OrbitAcq:positionsV"]["values"][0].as_array().unwrap();
        names
            .iter()
            .zip(values)
            .enumerate()
            .filter(|(_, (name, _))| name.as_str().unwrap().ends_with(".B1"))
            .map(|(i, (_, value))| (i, value.as_f64().unwrap()))
            .collect()
    }

    #[test]
    fn knob_fit_on_noisy_readings_brackets_the_true_setting() {
        let mut model = testing::model();
        let flat = vertical_b1(&testing::bpm_document(&model, 100.0));
        model.change_knob("on_x5", 40.0).unwrap();
        model.twiss().unwrap();
        let mut document = testing::bpm_document(&model, 100.0);
        let crossed = vertical_b1(&document);

        // Noise mostly orthogonal to the knob response, with a small component along it.
        let response: Vec<f64> = crossed.iter().zip(&flat).map(|(c, f)| c.1 - f.1).collect();
        let pattern: Vec<f64> = (0..response.len())
            .map(|i| ((i * 7) % 5) as f64 - 2.0)
            .collect();
        let dot = |u: &[f64], v: &[f64]| u.iter().zip(v).map(|(a, b)| a * b).sum::<f64>();
        let along = dot(&pattern, &response) / dot(&response, &response);
        let across: Vec<f64> = pattern.iter().zip(&response).map(|(p, r)| p - along * r).collect();
        let across_norm = dot(&across, &across).sqrt();
        let response_norm = dot(&response, &response).sqrt();
        assert!(across_norm > 0.0 && response_norm > 0.0);

        let amplitude_mm = 2e-3;
        for (k, (index, value)) in crossed.iter().enumerate() {
            let noise = amplitude_mm
                * (across[k] / across_norm + 0.1 * response[k] / response_norm);
            document["BFC.LHC:OrbitAcq:positionsV"]["values"][0][*index] =
                serde_json::json!(value + noise);
        }
        let snapshot = SnapshotFile::parse(&document.to_string()).unwrap();

        model.change_knob("on_x5", 0.0).unwrap();
        model.load_bpm(&snapshot, 150.0).unwrap();
        let request = KnobFit {
            knob: "on_x5".into(),
            beam: Beam::B1,
            plane: Plane::Vertical,
            guess: 0.0,
            bounds: (-100.0, 100.0),
            window: (0.0, model.length()),
        };
        let fit = fit_knob(
            &mut model,
            &request,
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let sigma = fit.uncertainties[0];
        assert!(sigma > 0.0);
        assert!((fit.params[0] - 40.0).abs() <= sigma, "{} +/- {}", fit.params[0], sigma);
        assert!(fit.cost > 0.0);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut model = testing::model();
        let snapshot = measured(&mut model);
        model.load_bpm(&snapshot, 150.0).unwrap();
        let request = KnobFit {
            knob: "on_x5".into(),
            beam: Beam::B1,
            plane: Plane::Vertical,
            guess: 0.0,
            bounds: (-100.0, 100.0),
            window: (300.0, 100.0),
        };
        let err = fit_knob(
            &mut model,
            &request,
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));
    }

    #[test]
    fn bump_fit_recovers_amplitudes() {
        let mut model = testing::model();
        let mut registry = BumpRegistry::new();
        registry.define("r5", Beam::B1).unwrap();
        registry.add_corrector("r5", "acbh3.r5b1", 1.0).unwrap();
        registry.define("l5", Beam::B1).unwrap();
        registry.add_corrector("l5", "acbxh1.l5", 1.0).unwrap();

        registry
            .apply_many(&mut model, &[("r5", 3.0), ("l5", -2.0)])
            .unwrap();
        let snapshot = measured(&mut model);
        registry
            .apply_many(&mut model, &[("r5", -2.0), ("l5", 3.0)])
            .unwrap();
        model.load_bpm(&snapshot, 150.0).unwrap();

        let request = BumpFit {
            entries: vec![("r5".into(), 1.0), ("l5".into(), 1.0)],
            beam: Beam::B1,
            plane: Plane::Horizontal,
            window: (0.0, model.length()),
            bounds: None,
        };
        let fit = fit_bumps(
            &mut model,
            &registry,
            &request,
            &FitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!((fit.params[0] - 3.0).abs() < 1e-6);
        assert!((fit.params[1] + 2.0).abs() < 1e-6);
    }
}
