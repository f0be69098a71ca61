//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, CommissionSettings, EngineSettings, OrderSettings, SlippageSettings,
    StrategySettings,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Prefix of environment overrides, e.g. `BARFLOW__ENGINE__INITIAL_CASH`.
pub const ENV_PREFIX: &str = "BARFLOW";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(environment())
        .build()?;

    config.try_deserialize()
}

/// Parse a TOML document, without environment overrides.
pub fn parse_config(toml: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

/// Render a configuration back to TOML.
pub fn to_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
