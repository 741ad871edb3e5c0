//! Error types for the Service Bus extension configuration.

use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Errors raised by [`ServiceBusConfiguration`](crate::ServiceBusConfiguration)
/// and settings handling
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The operation is not allowed in the current configuration state
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// An argument was absent or otherwise unusable
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::Parsing {
            message: error.to_string(),
        }
    }
}

/// Validation errors for names and tunables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Errors produced while turning a connection string into a messaging provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("Service Bus connection string is missing; set it explicitly or provide the '{setting}' setting")]
    Missing { setting: String },

    #[error("Malformed connection string: {message}")]
    Malformed { message: String },

    #[error("Connection string is missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Connection string is scoped to entity '{scope}' and cannot address '{entity}'")]
    EntityOutOfScope { scope: String, entity: String },
}
