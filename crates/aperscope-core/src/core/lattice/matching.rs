use super::handle::{LineHandle, MatchOutcome, MatchRequest, OracleError, TwissOptions};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

const SVD_EPS: f64 = 1e-14;

fn residuals<L: LineHandle + ?Sized>(
    line: &L,
    request: &MatchRequest,
) -> Result<DVector<f64>, OracleError> {
    let table = line.twiss(&TwissOptions {
        reverse: request.reverse,
        skip_global_quantities: true,
    })?;
    let values = request
        .targets
        .iter()
        .map(|target| {
            table
                .find(&target.element)
                .map(|(_, row)| row.quantity(target.quantity) - target.value)
                .ok_or_else(|| OracleError::UnknownElement(target.element.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DVector::from_vec(values))
}

fn set_all<L: LineHandle + ?Sized>(
    line: &mut L,
    names: &[String],
    values: &DVector<f64>,
) -> Result<(), OracleError> {
    for (name, value) in names.iter().zip(values.iter()) {
        line.set_var(name, *value)?;
    }
    Ok(())
}

/// Newton iterations on the target residuals with a forward-difference
/// Jacobian, each step solved in the least-squares sense by SVD.
///
/// Knob values are restored when the solver fails or does not converge.
pub fn newton_match<L: LineHandle + ?Sized>(
    line: &mut L,
    request: &MatchRequest,
) -> Result<MatchOutcome, OracleError> {
    if request.vary.is_empty() {
        return Err(OracleError::EmptyMatch("no knobs to vary"));
    }
    if request.targets.is_empty() {
        return Err(OracleError::EmptyMatch("no targets"));
    }
    let initial = DVector::from_vec(
        request
            .vary
            .iter()
            .map(|name| {
                line.var(name)
                    .ok_or_else(|| OracleError::UnknownVariable(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?,
    );

    let result = iterate(line, request, &initial);
    match result {
        Ok(outcome) if outcome.converged => Ok(outcome),
        Ok(outcome) => {
            warn!(
                iterations = outcome.iterations,
                "Match did not converge, restoring knobs"
            );
            set_all(line, &request.vary, &initial)?;
            Ok(outcome)
        }
        Err(e) => {
            set_all(line, &request.vary, &initial)?;
            Err(e)
        }
    }
}

fn iterate<L: LineHandle + ?Sized>(
    line: &mut L,
    request: &MatchRequest,
    initial: &DVector<f64>,
) -> Result<MatchOutcome, OracleError> {
    let n = request.vary.len();
    let m = request.targets.len();
    let mut x = initial.clone();
    let mut r = residuals(line, request)?;
    let mut iterations = 0;

    while r.amax() > request.tolerance && iterations < request.max_iterations {
        iterations += 1;
        let mut jacobian = DMatrix::zeros(m, n);
        for j in 0..n {
            let step = 1e-6 * x[j].abs().max(1e-3);
            line.set_var(&request.vary[j], x[j] + step)?;
            let shifted = residuals(line, request)?;
            line.set_var(&request.vary[j], x[j])?;
            jacobian.set_column(j, &((shifted - &r) / step));
        }

        let svd = jacobian.svd(true, true);
        let delta = match svd.solve(&(-&r), SVD_EPS) {
            Ok(delta) => delta,
            Err(reason) => {
                debug!(reason, "SVD solve failed");
                break;
            }
        };
        x += delta;
        set_all(line, &request.vary, &x)?;
        r = residuals(line, request)?;
        debug!(iteration = iterations, residual = r.amax(), "Match step");
    }

    Ok(MatchOutcome {
        converged: r.amax() <= request.tolerance,
        iterations,
        values: request
            .vary
            .iter()
            .cloned()
            .zip(x.iter().copied())
            .collect(),
        residuals: r.iter().copied().collect(),
    })
}
