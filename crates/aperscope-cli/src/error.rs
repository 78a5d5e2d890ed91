use aperscope::engine::config::ConfigError;
use aperscope::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Lines, twiss, matching or fitting failed inside the model.
    #[error("Optics model: {0}")]
    Engine(#[from] EngineError),

    #[error("Session configuration: {0}")]
    Config(String),

    #[error("Cannot read session file '{path}': {source}", path = path.display())]
    SessionFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot write table '{path}': {source}", path = path.display())]
    TableOutput {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("File access: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command line: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}
