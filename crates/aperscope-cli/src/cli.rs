use crate::utils::parser::{self, Span};
use aperscope::core::models::beam::{Beam, Plane};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "aperscope - optics, aperture margins and orbit fits for the two beams of a circular collider.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the optics of both beams and write them as CSV tables.
    Twiss(TwissArgs),
    /// Show the beam and chamber cross-section at an element and its n1 margin.
    N1(N1Args),
    /// Match a local orbit bump at an element with a set of correctors.
    Bump(BumpArgs),
    /// Fit a knob to the BPM orbit recorded in a measurement snapshot.
    Fit(FitArgs),
}

/// Options shared by every command that opens a session.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Path to the session configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Set a knob before the nominal orbit is taken. Can be used multiple times.
    #[arg(long = "knob", value_name = "NAME=VALUE", value_parser = parser::parse_assignment)]
    pub knobs: Vec<(String, f64)>,

    /// Cycle both beams so that this element sits at s = 0.
    #[arg(long, value_name = "ELEMENT")]
    pub cycle: Option<String>,

    /// Override the envelope size, in sigma.
    #[arg(short = 'n', long, value_name = "FLOAT")]
    pub envelope_n: Option<f64>,

    /// Override the normalised emittance, in metres.
    #[arg(long, value_name = "FLOAT")]
    pub emittance_n: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S model.envelope-n=6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `twiss` subcommand.
#[derive(Args, Debug)]
pub struct TwissArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Output prefix; tables are written to `<PREFIX>_b1.csv` and `<PREFIX>_b2.csv`.
    #[arg(short, long, required = true, value_name = "PREFIX")]
    pub output: PathBuf,
}

/// Error-budget overrides; unset values come from the `[errors]` table.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ErrorArgs {
    /// Relative beta-beating.
    #[arg(long, value_name = "FLOAT")]
    pub delta_beta: Option<f64>,
    /// Relative momentum offset.
    #[arg(long, value_name = "FLOAT")]
    pub delta: Option<f64>,
    /// Closed-orbit uncertainty, in metres.
    #[arg(long, value_name = "FLOAT")]
    pub delta_co: Option<f64>,
    /// Radial aperture tolerance, in metres.
    #[arg(long, value_name = "FLOAT")]
    pub rtol: Option<f64>,
    /// Horizontal aperture tolerance, in metres.
    #[arg(long, value_name = "FLOAT")]
    pub xtol: Option<f64>,
    /// Vertical aperture tolerance, in metres.
    #[arg(long, value_name = "FLOAT")]
    pub ytol: Option<f64>,
}

/// Arguments for the `n1` subcommand.
#[derive(Args, Debug)]
pub struct N1Args {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub errors: ErrorArgs,

    /// Element at which the cross-section is taken.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub element: String,

    /// Beam to inspect (b1 or b2).
    #[arg(short, long, default_value = "b1", value_name = "BEAM")]
    pub beam: Beam,

    /// Also write the chamber polygons as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub polygon: Option<PathBuf>,
}

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug)]
pub struct BumpArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Element at which the bump reaches its size.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub element: String,

    /// Corrector knobs to vary, comma separated.
    #[arg(long, value_delimiter = ',', value_name = "KNOB,...",
          required_unless_present = "region")]
    pub correctors: Vec<String>,

    /// Vary every corrector knob of this region (e.g. `r5`) in the bump plane.
    #[arg(short, long, value_name = "REGION", conflicts_with = "correctors")]
    pub region: Option<String>,

    /// Bump size at the element, in millimetres.
    #[arg(short, long, required = true, value_name = "MM", allow_negative_numbers = true)]
    pub size_mm: f64,

    #[arg(short, long, default_value = "b1", value_name = "BEAM")]
    pub beam: Beam,

    /// Bump plane (x or y).
    #[arg(short, long, default_value = "x", value_name = "PLANE")]
    pub plane: Plane,
}

/// Arguments for the `fit` subcommand.
#[derive(Args, Debug)]
pub struct FitArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Measurement snapshot (JSON) holding the BPM acquisitions.
    #[arg(long, required = true, value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Time of the acquisition to use; the latest sample at or before it is taken.
    #[arg(short, long, required = true, value_name = "TIME", allow_negative_numbers = true)]
    pub time: f64,

    /// Knob to fit.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub knob: String,

    #[arg(short, long, default_value = "b1", value_name = "BEAM")]
    pub beam: Beam,

    #[arg(short, long, default_value = "x", value_name = "PLANE")]
    pub plane: Plane,

    /// Observation window `LO,HI` in metres.
    #[arg(long, value_name = "LO,HI", allow_hyphen_values = true, conflicts_with = "ir")]
    pub window: Option<Span>,

    /// Use the dispersion-suppressor boundaries of this insertion as window.
    #[arg(long, value_name = "N")]
    pub ir: Option<u8>,

    /// Parameter bounds `LO,HI`; unbounded when omitted.
    #[arg(long, value_name = "LO,HI", allow_hyphen_values = true)]
    pub bounds: Option<Span>,

    /// Initial guess; the current knob value when omitted.
    #[arg(short, long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub guess: Option<f64>,
}
