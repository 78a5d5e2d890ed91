use aperscope::engine::config::DEFAULT_EMITTANCE_N;

/// Values used when neither the config file nor the command line sets them.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultsConfig {
    pub emittance_n: f64,
    pub envelope_n: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            emittance_n: DEFAULT_EMITTANCE_N,
            envelope_n: 5.0,
        }
    }
}
