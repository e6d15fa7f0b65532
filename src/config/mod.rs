//! The `config` module loads gateway settings.
//!
//! Sources, lowest priority first: built-in defaults, the optional file
//! `config/default.{toml,yaml,json,...}` (or an explicit path), then
//! environment variables prefixed with `MYSENSORS_` using `__` between
//! nesting levels, e.g. `MYSENSORS_GATEWAY__SEND_DELAY_MS=50`.

mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    GatewayKind, GatewaySettings, LoggingSettings, PartialGatewaySettings, PartialSettings,
    Settings,
};

/// Load configuration from `config/default` and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Load configuration from `path` (or `config/default` when `None`) and the
/// environment, filling any gaps with defaults.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix("MYSENSORS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge_with_defaults();
    settings.gateway.validate()?;
    Ok(settings)
}
