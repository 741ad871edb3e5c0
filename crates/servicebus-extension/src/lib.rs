//! # Service Bus Extension
//!
//! Configuration for the Service Bus message-queue extension: the connection
//! string, receive options for message handlers, and the messaging provider
//! used to create senders and receivers.
//!
//! ## Module Organization
//!
//! - [`configuration`] - The configuration holder and its lazy resolution rules
//! - [`message_options`] - Receive tuning (concurrency, auto-complete, lock renewal)
//! - [`connection_string`] - Ambient connection string sources and parsing
//! - [`provider`] - Provider factory trait and the default Service Bus provider
//! - [`settings`] - Layered startup settings (file and environment)
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```no_run
//! use servicebus_extension::{MessageOptions, ServiceBusConfiguration};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceBusConfiguration::new();
//! config.set_connection_string(Some(
//!     "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=app;SharedAccessKey=a2V5"
//!         .to_string(),
//! ))?;
//! config.set_message_options(MessageOptions::with_max_concurrent_calls(32));
//!
//! let provider = config.messaging_provider()?;
//! println!("Using namespace {}", provider.namespace());
//! # Ok(())
//! # }
//! ```

pub mod configuration;
pub mod connection_string;
pub mod error;
pub mod message_options;
pub mod provider;
pub mod settings;

// Re-export commonly used types at crate root for convenience
pub use configuration::ServiceBusConfiguration;
pub use connection_string::{
    ChainedConnectionStringSource, ConnectionStringNames, ConnectionStringSource,
    EnvironmentConnectionStringSource, InMemoryConnectionStringSource, ServiceBusConnection,
    AMBIENT_PREFIX,
};
pub use error::{ConfigurationError, ConnectionStringError, ValidationError};
pub use message_options::{MessageOptions, DEFAULT_MAX_CONCURRENT_CALLS};
pub use provider::{
    EntityPath, MessagingProvider, MessagingProviderFactory, ReceiverSettings, SenderSettings,
    ServiceBusProviderFactory,
};
pub use settings::{ServiceBusSettings, ENVIRONMENT_PREFIX};
