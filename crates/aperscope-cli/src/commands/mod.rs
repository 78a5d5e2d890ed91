pub mod bump;
pub mod fit;
pub mod n1;
pub mod twiss;

use crate::cli::{ErrorArgs, SessionArgs};
use crate::config::{FileConfig, ResolvedConfig, resolve};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use aperscope::engine::model::OpticsModel;
use aperscope::engine::progress::ProgressReporter;
use aperscope::workflows;
use tracing::info;

/// Resolves the configuration and opens the session it describes.
fn open_session(
    args: &SessionArgs,
    errors: Option<&ErrorArgs>,
    reporter: &ProgressReporter,
) -> Result<(ResolvedConfig, OpticsModel)> {
    let file = FileConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = resolve(file, args, errors)?;
    let model = workflows::session::open(&config.session, reporter)?;
    Ok((config, model))
}

fn reporter(handler: &CliProgressHandler) -> ProgressReporter<'static> {
    ProgressReporter::with_callback(handler.get_callback())
}
