mod settings;

use config::{Config, Environment, File};

use crate::utils::ConfigError;
use settings::PartialSettings;

pub use settings::{BrokerSettings, DrainSettings, Overrides, Settings};

/// Default location of the optional settings file, relative to the working
/// directory and without extension (`config/default.toml`, `.yaml`, ...).
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment variables, e.g. `DLQ__BROKER__NAMESPACE`.
pub const ENV_PREFIX: &str = "DLQ";

/// Loads the configuration from the default file, environment variables and
/// command-line overrides, merged over default values.
pub fn load_config(overrides: &Overrides) -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE, overrides)
}

/// Same as [`load_config`] with an explicit settings file.
pub fn load_config_from(file: &str, overrides: &Overrides) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("broker.namespace", overrides.namespace.clone())?
        .set_override_option("broker.queue", overrides.queue.clone())?
        .set_override_option(
            "drain.batch_size",
            overrides.batch_size.map(|n| n as u64),
        )?
        .set_override_option(
            "drain.randomize_ids",
            overrides.disable_random_ids.then_some(false),
        )?
        .set_override_option("log_level", overrides.log_level.clone())?;

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = merge(partial);
    validate(&settings)?;
    Ok(settings)
}

fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();

    Settings {
        broker: BrokerSettings {
            namespace: partial
                .broker
                .as_ref()
                .and_then(|b| b.namespace.clone())
                .unwrap_or(default.broker.namespace),
            queue: partial
                .broker
                .as_ref()
                .and_then(|b| b.queue.clone())
                .unwrap_or(default.broker.queue),
        },
        drain: DrainSettings {
            batch_size: partial
                .drain
                .as_ref()
                .and_then(|d| d.batch_size)
                .unwrap_or(default.drain.batch_size),
            randomize_ids: partial
                .drain
                .as_ref()
                .and_then(|d| d.randomize_ids)
                .unwrap_or(default.drain.randomize_ids),
            id_length: partial
                .drain
                .as_ref()
                .and_then(|d| d.id_length)
                .unwrap_or(default.drain.id_length),
        },
        log_level: partial.log_level.unwrap_or(default.log_level),
    }
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.broker.namespace.trim().is_empty() || settings.broker.queue.trim().is_empty() {
        return Err(ConfigError::MissingRequired);
    }
    if settings.drain.batch_size == 0 {
        return Err(ConfigError::Invalid {
            field: "batch_size",
            message: "must be at least 1".to_string(),
        });
    }
    if settings.drain.id_length == 0 {
        return Err(ConfigError::Invalid {
            field: "id_length",
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}
