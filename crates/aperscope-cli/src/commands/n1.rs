use super::{open_session, reporter};
use crate::cli::N1Args;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use aperscope::core::utils::geometry::Rect;
use aperscope::engine::cross_section::CrossSection;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct PolygonPoint {
    outline: &'static str,
    x: f64,
    y: f64,
}

/// Writes the chamber and envelope outlines, one point per line.
fn write_polygons(path: &Path, section: &CrossSection) -> Result<()> {
    let file_error = |source: csv::Error| CliError::TableOutput {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(file_error)?;
    let outlines: [(&'static str, Vec<(f64, f64)>); 4] = [
        ("aperture", section.aperture.clone()),
        ("aperture_with_errors", section.aperture_with_errors.clone()),
        ("envelope", section.envelope.corners().to_vec()),
        (
            "envelope_with_errors",
            section.envelope_with_errors.corners().to_vec(),
        ),
    ];
    for (outline, points) in outlines {
        for (x, y) in points {
            writer
                .serialize(PolygonPoint { outline, x, y })
                .map_err(file_error)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn describe(rect: &Rect) -> String {
    format!(
        "x [{:+.3}, {:+.3}] mm, y [{:+.3}, {:+.3}] mm",
        rect.x_min * 1e3,
        rect.x_max * 1e3,
        rect.y_min * 1e3,
        rect.y_max * 1e3
    )
}

pub fn run(args: N1Args) -> Result<()> {
    let progress = CliProgressHandler::new();
    let reporter = reporter(&progress);
    let (config, mut model) = open_session(&args.session, Some(&args.errors), &reporter)?;

    let section = model.cross_section(&args.element, args.beam, &config.errors)?;
    info!(
        element = %section.element,
        beam = %args.beam,
        n1 = section.n1.min(),
        n1_with_errors = section.n1_with_errors.min(),
        "Cross-section computed."
    );

    println!("{} ({}) at s = {:.3} m", section.element, args.beam, section.s);
    println!(
        "  orbit:                 x {:+.3} mm, y {:+.3} mm",
        section.orbit.0 * 1e3,
        section.orbit.1 * 1e3
    );
    println!("  envelope:              {}", describe(&section.envelope));
    println!("  envelope with errors:  {}", describe(&section.envelope_with_errors));
    println!(
        "  n1:                    x {:.2}, y {:.2} (min {:.2})",
        section.n1.x,
        section.n1.y,
        section.n1.min()
    );
    println!(
        "  n1 with errors:        x {:.2}, y {:.2} (min {:.2})",
        section.n1_with_errors.x,
        section.n1_with_errors.y,
        section.n1_with_errors.min()
    );

    if let Some(path) = &args.polygon {
        write_polygons(path, &section)?;
        println!("  outlines written to {}", path.display());
    }
    Ok(())
}
