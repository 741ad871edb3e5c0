//! Messaging providers: the capability used to create senders and receivers.
//!
//! The configuration builds its provider lazily through a
//! [`MessagingProviderFactory`]. The default [`ServiceBusProviderFactory`]
//! parses the connection string into a [`MessagingProvider`], which hands out
//! the addressing and tuning a host's broker client needs to open message
//! senders and receivers.

use crate::connection_string::{ConnectionStringNames, ServiceBusConnection};
use crate::error::{ConnectionStringError, ValidationError};
use crate::message_options::MessageOptions;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

/// Builds messaging providers from a connection string
///
/// Implementations define their own error type; the configuration passes it
/// through to callers untouched.
pub trait MessagingProviderFactory: Send + Sync {
    type Provider: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a provider for the given connection string, which may be absent
    fn create(&self, connection_string: Option<&str>) -> Result<Self::Provider, Self::Error>;
}

// ============================================================================
// Entity Paths
// ============================================================================

/// Path of a queue, topic, or subscription within a namespace
///
/// Subscriptions use the `<topic>/Subscriptions/<name>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityPath(String);

impl EntityPath {
    /// Create new entity path with validation
    ///
    /// # Validation Rules
    /// - Must be 1-260 characters
    /// - Segments separated by `/`, none empty
    /// - Segments contain only ASCII alphanumerics, `-`, `_` and `.`
    /// - No segment is made only of dots (`.`, `..`), so addresses never
    ///   resolve outside the named entity
    pub fn new(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = path.into();

        if path.is_empty() || path.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "entity_path".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        for segment in path.split('/') {
            if segment.is_empty() {
                return Err(ValidationError::InvalidFormat {
                    field: "entity_path".to_string(),
                    message: "no empty segments or leading/trailing '/'".to_string(),
                });
            }

            if segment.chars().all(|c| c == '.') {
                return Err(ValidationError::InvalidFormat {
                    field: "entity_path".to_string(),
                    message: "segments cannot consist only of '.'".to_string(),
                });
            }

            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            {
                return Err(ValidationError::InvalidFormat {
                    field: "entity_path".to_string(),
                    message: "only ASCII alphanumeric, '-', '_' and '.' allowed".to_string(),
                });
            }
        }

        Ok(Self(path))
    }

    /// Path of a subscription under a topic
    pub fn subscription(topic: &str, subscription: &str) -> Result<Self, ValidationError> {
        Self::new(format!("{}/Subscriptions/{}", topic, subscription))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Provider
// ============================================================================

/// What a broker client needs to open a message sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSettings {
    pub entity_path: EntityPath,
    pub address: Url,
}

/// What a broker client needs to open a message receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverSettings {
    pub entity_path: EntityPath,
    pub address: Url,
    pub options: MessageOptions,
}

/// Service Bus messaging provider bound to one namespace
#[derive(Debug, Clone)]
pub struct MessagingProvider {
    connection: ServiceBusConnection,
}

impl MessagingProvider {
    pub fn new(connection: ServiceBusConnection) -> Self {
        Self { connection }
    }

    /// Parse a connection string and build a provider from it
    pub fn from_connection_string(connection_string: &str) -> Result<Self, ConnectionStringError> {
        ServiceBusConnection::parse(connection_string).map(Self::new)
    }

    pub fn connection(&self) -> &ServiceBusConnection {
        &self.connection
    }

    pub fn namespace(&self) -> &str {
        self.connection.namespace()
    }

    /// Address of an entity within the namespace
    pub fn entity_address(&self, entity_path: &EntityPath) -> Result<Url, ConnectionStringError> {
        self.connection
            .endpoint()
            .join(entity_path.as_str())
            .map_err(|e| ConnectionStringError::InvalidEndpoint {
                endpoint: self.connection.endpoint().to_string(),
                message: e.to_string(),
            })
    }

    /// Settings for a sender targeting `entity_path`
    pub fn create_sender(&self, entity_path: &EntityPath) -> Result<SenderSettings, ConnectionStringError> {
        self.check_entity_scope(entity_path)?;
        Ok(SenderSettings {
            address: self.entity_address(entity_path)?,
            entity_path: entity_path.clone(),
        })
    }

    /// Settings for a receiver on `entity_path`, tuned by `options`
    pub fn create_receiver(
        &self,
        entity_path: &EntityPath,
        options: &MessageOptions,
    ) -> Result<ReceiverSettings, ConnectionStringError> {
        self.check_entity_scope(entity_path)?;
        Ok(ReceiverSettings {
            address: self.entity_address(entity_path)?,
            entity_path: entity_path.clone(),
            options: *options,
        })
    }

    /// An entity-scoped connection string only grants access to that entity
    /// (and, for topics, its subscriptions).
    fn check_entity_scope(&self, entity_path: &EntityPath) -> Result<(), ConnectionStringError> {
        let Some(scope) = self.connection.entity_path() else {
            return Ok(());
        };

        let requested = entity_path.as_str();
        let in_scope = requested.eq_ignore_ascii_case(scope)
            || requested
                .get(..scope.len() + 1)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&format!("{}/", scope)));

        if in_scope {
            Ok(())
        } else {
            Err(ConnectionStringError::EntityOutOfScope {
                scope: scope.to_string(),
                entity: requested.to_string(),
            })
        }
    }
}

/// Default factory: parses Service Bus connection strings
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceBusProviderFactory;

impl MessagingProviderFactory for ServiceBusProviderFactory {
    type Provider = MessagingProvider;
    type Error = ConnectionStringError;

    fn create(&self, connection_string: Option<&str>) -> Result<MessagingProvider, ConnectionStringError> {
        let connection_string = connection_string
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConnectionStringError::Missing {
                setting: ConnectionStringNames::ambient_setting(ConnectionStringNames::SERVICE_BUS),
            })?;

        let provider = MessagingProvider::from_connection_string(connection_string)?;
        debug!(namespace = %provider.namespace(), "Created Service Bus messaging provider");

        Ok(provider)
    }
}
