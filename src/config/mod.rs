//! Configuration loading.
//!
//! Settings come from an optional `config/default` file (any format the
//! `config` crate understands) and from `SMSTRACK_`-prefixed environment
//! variables, where `__` separates nesting levels, e.g.
//! `SMSTRACK_TRACKER__DELIVERY_TIMEOUT_MS=30000`.

mod settings;

use config::{Config, Environment, File};

use crate::utils::error::SettingsError;
use settings::PartialSettings;

pub use settings::{LoggingSettings, ServerSettings, Settings, StoreSettings, TrackerSettings};

/// Loads `config/default` plus the environment, merged over the defaults.
pub fn load_config() -> Result<Settings, SettingsError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] but reads the file at `path` (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings, SettingsError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("SMSTRACK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge_over(Settings::default());

    settings.tracker.validate()?;
    Ok(settings)
}
