//! # Service Bus Configuration
//!
//! Settings holder for the Service Bus extension: connection string, message
//! receive options, and the messaging provider used to build clients.
//!
//! ## Lifecycle
//!
//! A configuration is created once at startup and adjusted while the host
//! initializes. Two values are resolved lazily and then cached:
//!
//! - The connection string is looked up from the ambient
//!   [`ConnectionStringSource`] on first read unless it was set explicitly.
//! - The messaging provider is built from the connection string on first read
//!   unless it was set explicitly.
//!
//! Once the provider exists (built or set) the connection string is locked and
//! [`ServiceBusConfiguration::set_connection_string`] fails. Message options
//! are independent of that lock and can be replaced at any time.
//!
//! All state sits behind one mutex, so each lazy step runs at most once even
//! when several threads race for the first read.

use crate::connection_string::{
    ConnectionStringNames, ConnectionStringSource, EnvironmentConnectionStringSource,
};
use crate::error::ConfigurationError;
use crate::message_options::MessageOptions;
use crate::provider::{MessagingProviderFactory, ServiceBusProviderFactory};
use crate::settings::ServiceBusSettings;
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;

/// Configuration options for the Service Bus extension
///
/// Generic over the provider factory so hosts and tests can substitute their
/// own provider type; the default builds a
/// [`MessagingProvider`](crate::MessagingProvider) from a Service Bus
/// connection string.
pub struct ServiceBusConfiguration<F: MessagingProviderFactory = ServiceBusProviderFactory> {
    source: Arc<dyn ConnectionStringSource>,
    factory: F,
    state: Mutex<ConfigurationState<F::Provider>>,
}

struct ConfigurationState<P> {
    connection_string: Option<String>,
    // Set by an explicit assignment or the first ambient lookup
    connection_string_set: bool,
    message_options: MessageOptions,
    // Present once resolved; never cleared
    provider: Option<Arc<P>>,
}

impl ServiceBusConfiguration {
    /// Create a configuration backed by the process environment and the
    /// default Service Bus provider factory
    pub fn new() -> Self {
        Self::with_components(
            Arc::new(EnvironmentConnectionStringSource::new()),
            ServiceBusProviderFactory,
        )
    }
}

impl Default for ServiceBusConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: MessagingProviderFactory> ServiceBusConfiguration<F> {
    /// Create a configuration with an explicit ambient source and provider factory
    ///
    /// Message options start at their defaults; nothing is resolved yet.
    pub fn with_components(source: Arc<dyn ConnectionStringSource>, factory: F) -> Self {
        Self {
            source,
            factory,
            state: Mutex::new(ConfigurationState {
                connection_string: None,
                connection_string_set: false,
                message_options: MessageOptions::default(),
                provider: None,
            }),
        }
    }

    // Every mutation leaves the state consistent, so a poisoned lock is safe to reuse
    fn state(&self) -> MutexGuard<'_, ConfigurationState<F::Provider>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_connection_string<'a>(
        &self,
        state: &'a mut ConfigurationState<F::Provider>,
    ) -> &'a Option<String> {
        if !state.connection_string_set {
            state.connection_string = self
                .source
                .connection_string(ConnectionStringNames::SERVICE_BUS);
            state.connection_string_set = true;

            debug!(
                name = ConnectionStringNames::SERVICE_BUS,
                found = state.connection_string.is_some(),
                "Resolved ambient connection string"
            );
        }

        &state.connection_string
    }

    /// Get the Service Bus connection string
    ///
    /// If it was never set, the ambient source is consulted once and the
    /// result, including absence, is cached for the life of the configuration.
    pub fn connection_string(&self) -> Option<String> {
        let mut state = self.state();
        self.resolve_connection_string(&mut state).clone()
    }

    /// Set the Service Bus connection string
    ///
    /// The value is stored verbatim and ambient resolution is disabled for
    /// good.
    ///
    /// # Errors
    /// - `ConfigurationError::InvalidOperation` - The messaging provider has
    ///   already been created or set
    pub fn set_connection_string(&self, value: Option<String>) -> Result<(), ConfigurationError> {
        let mut state = self.state();

        if state.provider.is_some() {
            warn!("Rejected connection string change after messaging provider initialization");
            return Err(ConfigurationError::InvalidOperation {
                message: "ConnectionString cannot be modified after the MessagingProvider has been initialized."
                    .to_string(),
            });
        }

        state.connection_string = value;
        state.connection_string_set = true;
        Ok(())
    }

    /// Options used by message receivers
    pub fn message_options(&self) -> MessageOptions {
        self.state().message_options
    }

    /// Replace the message options
    pub fn set_message_options(&self, options: MessageOptions) {
        self.state().message_options = options;
    }

    /// Get the messaging provider, creating it on first use
    ///
    /// Creation happens once, from the current connection string, and locks
    /// the connection string. Errors from the factory are returned unchanged
    /// and leave the provider unresolved.
    pub fn messaging_provider(&self) -> Result<Arc<F::Provider>, F::Error> {
        let mut state = self.state();

        if let Some(provider) = &state.provider {
            return Ok(Arc::clone(provider));
        }

        let connection_string = self.resolve_connection_string(&mut state).clone();
        let provider = Arc::new(self.factory.create(connection_string.as_deref())?);
        state.provider = Some(Arc::clone(&provider));

        info!("Messaging provider created; connection string is now fixed");
        Ok(provider)
    }

    /// Set the messaging provider explicitly
    ///
    /// The provider is stored as given and the connection string is locked,
    /// even though the factory is never called.
    ///
    /// # Errors
    /// - `ConfigurationError::InvalidArgument` - `provider` is `None`
    pub fn set_messaging_provider(
        &self,
        provider: Option<Arc<F::Provider>>,
    ) -> Result<(), ConfigurationError> {
        let provider = provider.ok_or_else(|| ConfigurationError::InvalidArgument {
            argument: "value".to_string(),
            message: "a messaging provider is required".to_string(),
        })?;

        self.state().provider = Some(provider);
        info!("Messaging provider set explicitly; connection string is now fixed");
        Ok(())
    }

    /// Whether the messaging provider has been created or set
    pub fn is_provider_resolved(&self) -> bool {
        self.state().provider.is_some()
    }

    /// Apply loaded settings during startup
    ///
    /// Settings are validated first. A connection string in the settings is
    /// subject to the same lock as [`Self::set_connection_string`]; when it is
    /// rejected the message options are left unchanged.
    pub fn apply_settings(&self, settings: &ServiceBusSettings) -> Result<(), ConfigurationError> {
        settings.validate()?;

        if let Some(connection_string) = &settings.connection_string {
            self.set_connection_string(Some(connection_string.clone()))?;
        }
        self.set_message_options(settings.message_options);

        Ok(())
    }
}

impl<F: MessagingProviderFactory> fmt::Debug for ServiceBusConfiguration<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ServiceBusConfiguration")
            .field(
                "connection_string",
                if state.connection_string.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field("connection_string_set", &state.connection_string_set)
            .field("message_options", &state.message_options)
            .field("provider_resolved", &state.provider.is_some())
            .finish()
    }
}
