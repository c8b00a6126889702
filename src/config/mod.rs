//! Configuration loading.
//!
//! Values come from an optional `config/default.*` file and `CLASSLINK__*`
//! environment variables (double underscore between section and key, e.g.
//! `CLASSLINK__API__BASE_URL`), layered over [`Settings::default`].

mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    ApiSettings, CommentSettings, LogSettings, NotificationSettings, PartialSettings,
    RealtimeSettings, Settings, StorageSettings,
};

pub const ENV_PREFIX: &str = "CLASSLINK";

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("realtime.class_resources")
                .with_list_parse_key("realtime.private_queues")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}
