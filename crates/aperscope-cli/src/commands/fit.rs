use super::{open_session, reporter};
use crate::cli::FitArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use aperscope::engine::error::EngineError;
use aperscope::engine::fitter::KnobFit;
use aperscope::workflows::fit::{self, Measurement};
use tracing::{info, warn};

pub fn run(args: FitArgs) -> Result<()> {
    let progress = CliProgressHandler::new();
    let reporter = reporter(&progress);
    let (config, mut model) = open_session(&args.session, None, &reporter)?;

    let window = match (args.window, args.ir) {
        (Some(span), _) => (span.lo, span.hi),
        (None, Some(ir)) => model.get_ir_boundries(args.beam, ir)?,
        (None, None) => (0.0, model.length()),
    };
    if window.0 > window.1 {
        warn!(?window, "Observation window straddles the origin.");
        return Err(CliError::Argument(format!(
            "window [{}, {}] wraps around s = 0; cycle to an element outside it with --cycle",
            window.0, window.1
        )));
    }

    let current = model
        .knob(&args.knob)
        .map(|k| k.current)
        .ok_or_else(|| CliError::Argument(format!("unknown knob '{}'", args.knob)))?;
    let request = KnobFit {
        knob: args.knob.clone(),
        beam: args.beam,
        plane: args.plane,
        guess: args.guess.unwrap_or(current),
        bounds: args
            .bounds
            .map(Into::into)
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY)),
        window,
    };
    info!(?request, "Fit request assembled.");

    let measurement = Measurement {
        snapshot: &args.snapshot,
        time: args.time,
    };
    match fit::knob(&mut model, &measurement, &request, &config.fit, &reporter) {
        Ok(result) => {
            println!(
                "{} = {:.6} ± {:.6} ({} iteration(s), cost {:.3e}, {} BPMs)",
                request.knob,
                result.params[0],
                result.uncertainties[0],
                result.iterations,
                result.cost,
                result.residuals.len()
            );
            Ok(())
        }
        Err(EngineError::FitNonConvergence {
            reason,
            best,
            uncertainties,
        }) => {
            println!(
                "Fit did not converge ({}); best {} = {:?} ± {:?}",
                reason, request.knob, best, uncertainties
            );
            Err(EngineError::FitNonConvergence {
                reason,
                best,
                uncertainties,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}
