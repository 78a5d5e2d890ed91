mod builder;
mod defaults;
mod file;

pub use builder::{ResolvedConfig, resolve};
pub use defaults::DefaultsConfig;
pub use file::FileConfig;
