//! Startup settings for the Service Bus extension.
//!
//! Settings are layered with the `config` crate. Sources are applied in order,
//! later ones overriding earlier ones:
//!
//! 1. An optional settings file (format picked from its extension: toml, json, yaml)
//! 2. Environment variables prefixed `SERVICEBUS`, with `__` separating levels,
//!    e.g. `SERVICEBUS__MESSAGE_OPTIONS__MAX_CONCURRENT_CALLS=8`
//!
//! Every field has a default, so an empty environment yields valid settings.

use crate::connection_string::InMemoryConnectionStringSource;
use crate::error::ConfigurationError;
use crate::message_options::MessageOptions;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, path::Path};
use tracing::info;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Prefix for environment variables read by [`ServiceBusSettings::load`]
pub const ENVIRONMENT_PREFIX: &str = "SERVICEBUS";

/// Settings applied to a [`ServiceBusConfiguration`](crate::ServiceBusConfiguration)
/// during startup
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceBusSettings {
    /// Explicit Service Bus connection string
    pub connection_string: Option<String>,

    /// Receive tuning for message handlers
    pub message_options: MessageOptions,

    /// Named connection strings offered as an ambient source
    pub connection_strings: HashMap<String, String>,
}

impl ServiceBusSettings {
    /// Load settings from an optional file and the environment
    ///
    /// # Errors
    /// - `ConfigurationError::Parsing` - The file is missing or malformed, or a
    ///   value cannot be converted to its field type
    /// - `ConfigurationError::Validation` - The loaded values are out of range
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading Service Bus settings from file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: ServiceBusSettings = builder
            .add_source(
                config::Environment::with_prefix(ENVIRONMENT_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check the loaded values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.message_options.validate()?;
        Ok(())
    }

    /// Named connection strings as a lookup source
    pub fn connection_string_source(&self) -> InMemoryConnectionStringSource {
        InMemoryConnectionStringSource::from(self.connection_strings.clone())
    }
}

impl fmt::Debug for ServiceBusSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.connection_strings.keys().collect();
        names.sort();
        f.debug_struct("ServiceBusSettings")
            .field(
                "connection_string",
                if self.connection_string.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field("message_options", &self.message_options)
            .field("connection_strings", &names)
            .finish()
    }
}
