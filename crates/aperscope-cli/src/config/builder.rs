use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileErrorBudget, FileFitConfig, FileModelConfig};
use crate::cli::{ErrorArgs, SessionArgs};
use crate::error::{CliError, Result};
use aperscope::engine::config::{
    ErrorBudget, FitConfig, ModelConfig, SessionConfig, SessionConfigBuilder,
};
use tracing::debug;

/// Everything a command needs, after merging file, arguments and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub session: SessionConfig,
    pub errors: ErrorBudget,
    pub fit: FitConfig,
}

/// Merges `file` with the command line. Precedence is dedicated flags, then
/// `-S` overrides, then the file, then [`DefaultsConfig`].
pub fn resolve(
    mut file: FileConfig,
    args: &SessionArgs,
    errors: Option<&ErrorArgs>,
) -> Result<ResolvedConfig> {
    file.apply_set_values(&args.set_values)?;
    let defaults = DefaultsConfig::default();

    let line = file.session.line.take().ok_or_else(|| {
        CliError::Config(
            "`session.line` is required either in the config file or via -S session.line=PATH."
                .to_string(),
        )
    })?;

    let mut knobs = std::mem::take(&mut file.knobs);
    for (name, value) in &args.knobs {
        knobs.insert(name.clone(), *value);
    }

    let mut builder = SessionConfigBuilder::new()
        .line_path(line)
        .aperture_path(file.session.aperture.take())
        .elements_path(file.session.elements.take())
        .collimators_path(file.session.collimators.take())
        .anchor(args.cycle.clone().or(file.session.anchor.take()))
        .model(merge_model(&file.model, args, &defaults)?);
    for (name, value) in knobs {
        builder = builder.knob(name, value);
    }
    let session = builder.build()?;

    let resolved = ResolvedConfig {
        session,
        errors: merge_errors(&file.errors, errors.copied().unwrap_or_default())?,
        fit: merge_fit(&file.fit)?,
    };
    debug!("Resolved configuration: {:?}", resolved);
    Ok(resolved)
}

fn merge_model(
    file: &FileModelConfig,
    args: &SessionArgs,
    defaults: &DefaultsConfig,
) -> Result<ModelConfig> {
    let mut builder = ModelConfig::builder()
        .emittance_n(
            args.emittance_n
                .or(file.emittance_n)
                .unwrap_or(defaults.emittance_n),
        )
        .envelope_n(
            args.envelope_n
                .or(file.envelope_n)
                .unwrap_or(defaults.envelope_n),
        );
    if let Some(length) = file.length {
        builder = builder.length(length);
    }
    if let Some(tolerance) = file.match_tolerance {
        builder = builder.match_tolerance(tolerance);
    }
    if let Some(iterations) = file.match_max_iterations {
        builder = builder.match_max_iterations(iterations);
    }
    Ok(builder.build()?)
}

fn merge_errors(file: &FileErrorBudget, cli: ErrorArgs) -> Result<ErrorBudget> {
    let pick = |cli: Option<f64>, file: Option<f64>| cli.or(file).unwrap_or(0.0);
    Ok(ErrorBudget::builder()
        .delta_beta(pick(cli.delta_beta, file.delta_beta))
        .delta(pick(cli.delta, file.delta))
        .delta_co(pick(cli.delta_co, file.delta_co))
        .rtol(pick(cli.rtol, file.rtol))
        .xtol(pick(cli.xtol, file.xtol))
        .ytol(pick(cli.ytol, file.ytol))
        .build()?)
}

fn merge_fit(file: &FileFitConfig) -> Result<FitConfig> {
    let mut builder = FitConfig::builder();
    if let Some(iterations) = file.max_iterations {
        builder = builder.max_iterations(iterations);
    }
    if let Some(tolerance) = file.cost_tolerance {
        builder = builder.cost_tolerance(tolerance);
    }
    if let Some(tolerance) = file.step_tolerance {
        builder = builder.step_tolerance(tolerance);
    }
    if let Some(damping) = file.initial_damping {
        builder = builder.initial_damping(damping);
    }
    Ok(builder.build()?)
}
