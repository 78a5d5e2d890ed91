use super::{open_session, reporter};
use crate::cli::BumpArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use aperscope::engine::progress::Progress;
use tracing::info;

pub fn run(args: BumpArgs) -> Result<()> {
    let progress = CliProgressHandler::new();
    let reporter = reporter(&progress);
    let (_, mut model) = open_session(&args.session, None, &reporter)?;

    let correctors = match &args.region {
        Some(region) => {
            let knobs = model.sort_acb_knobs_by_region(args.beam, args.plane, region);
            if knobs.is_empty() {
                return Err(CliError::Argument(format!(
                    "no {} corrector knobs of {} found in region '{}'",
                    args.plane, args.beam, region
                )));
            }
            knobs
        }
        None => args.correctors.clone(),
    };
    info!(
        element = %args.element,
        correctors = ?correctors,
        size_mm = args.size_mm,
        "Matching local bump."
    );

    reporter.report(Progress::PhaseStart {
        name: "Matching Bump",
    });
    let outcome = model.match_local_bump(
        &args.element,
        &correctors,
        args.size_mm,
        args.beam,
        args.plane,
    );
    reporter.report(Progress::PhaseFinish);
    let outcome = outcome?;

    let element = args.element.to_ascii_lowercase();
    let reached = model
        .optics(args.beam)?
        .get(&element)
        .map(|row| row.orbit(args.plane) * 1e3);

    println!(
        "Local bump at {} ({}, {}) matched in {} iteration(s):",
        element, args.beam, args.plane, outcome.iterations
    );
    for (knob, value) in &outcome.values {
        println!("  {:<20} {:+.6e}", knob, value);
    }
    if let Some(orbit) = reached {
        println!("  orbit at {}: {:+.4} mm", element, orbit);
    }
    let worst = outcome
        .residuals
        .iter()
        .map(|r| r.abs())
        .fold(0.0, f64::max);
    println!("  largest residual: {:.3e}", worst);
    Ok(())
}
