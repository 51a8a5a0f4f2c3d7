use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod kinds;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use kinds::{AttributeConfig, DefaultValue, KindConfig};
pub use logging::init_tracing;
pub use settings::{Config, DatabaseOverrides, DatabaseSettings, LoggingSettings, SqlTypeList};

/// Prefix of environment variables that override file settings, e.g.
/// `MARQUEE__DATABASE__HOSTNAME=db.internal`.
pub const ENV_PREFIX: &str = "MARQUEE";

/// Loads the application configuration from `config.toml` in the working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Loads the configuration from `path` (which may be missing), layers the
/// `MARQUEE__*` environment variables on top and validates the result.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    finish(builder)
}

/// Parses a configuration from TOML text without consulting the environment.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    finish(builder)
}

fn finish(builder: config::Config) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let db = &config.database;
    if db.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "database.connect_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if db.statement_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "database.statement_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logging.level must not be empty".to_string(),
        ));
    }
    if let Some((value_type, _)) = config
        .type_mapping
        .iter()
        .flatten()
        .find(|(_, types)| types.to_vec().iter().all(|t| t.trim().is_empty()))
    {
        return Err(ConfigError::ValidationError(format!(
            "type_mapping.{value_type} lists no SQL types"
        )));
    }
    Ok(())
}
