use super::{open_session, reporter};
use crate::cli::TwissArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use aperscope::core::models::beam::Beam;
use aperscope::core::models::optics::OpticsRow;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// One CSV line of an optics table, in metres unless noted.
#[derive(Serialize)]
struct OpticsRecord<'a> {
    name: &'a str,
    s: f64,
    x: f64,
    y: f64,
    betx: f64,
    bety: f64,
    dx: f64,
    dy: f64,
    sigma_x: f64,
    sigma_y: f64,
    x_up: f64,
    x_down: f64,
    y_up: f64,
    y_down: f64,
    x_from_nom_to_top_mm: f64,
    x_from_nom_to_bottom_mm: f64,
    y_from_nom_to_top_mm: f64,
    y_from_nom_to_bottom_mm: f64,
}

impl<'a> From<&'a OpticsRow> for OpticsRecord<'a> {
    fn from(row: &'a OpticsRow) -> Self {
        Self {
            name: &row.name,
            s: row.s,
            x: row.x,
            y: row.y,
            betx: row.betx,
            bety: row.bety,
            dx: row.dx,
            dy: row.dy,
            sigma_x: row.sigma_x,
            sigma_y: row.sigma_y,
            x_up: row.x_up,
            x_down: row.x_down,
            y_up: row.y_up,
            y_down: row.y_down,
            x_from_nom_to_top_mm: row.x_from_nom_to_top,
            x_from_nom_to_bottom_mm: row.x_from_nom_to_bottom,
            y_from_nom_to_top_mm: row.y_from_nom_to_top,
            y_from_nom_to_bottom_mm: row.y_from_nom_to_bottom,
        }
    }
}

/// `<prefix>_b1.csv` / `<prefix>_b2.csv`.
fn output_path(prefix: &Path, beam: Beam) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!("_{}.csv", beam.suffix()));
    PathBuf::from(name)
}

fn write_table(path: &Path, rows: &[OpticsRow]) -> Result<()> {
    let file_error = |source: csv::Error| CliError::TableOutput {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(file_error)?;
    for row in rows {
        writer.serialize(OpticsRecord::from(row)).map_err(file_error)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run(args: TwissArgs) -> Result<()> {
    let progress = CliProgressHandler::new();
    let reporter = reporter(&progress);
    let (_, mut model) = open_session(&args.session, None, &reporter)?;

    for beam in Beam::ALL {
        let optics = model.optics(beam)?;
        let path = output_path(&args.output, beam);
        info!(%beam, rows = optics.len(), path = %path.display(), "Writing optics table.");
        write_table(&path, optics.rows())?;

        let peak = |f: fn(&OpticsRow) -> f64| {
            optics.rows().iter().map(|r| f(r).abs()).fold(0.0, f64::max)
        };
        println!(
            "{}: {} rows, max |x| = {:.3} mm, max |y| = {:.3} mm -> {}",
            beam,
            optics.len(),
            peak(|r| r.x) * 1e3,
            peak(|r| r.y) * 1e3,
            path.display()
        );
    }
    Ok(())
}
