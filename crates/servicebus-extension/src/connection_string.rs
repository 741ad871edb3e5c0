//! Connection strings: where they come from and what they contain.
//!
//! The configuration never reads process-wide state directly. It asks a
//! [`ConnectionStringSource`] for a named connection string, and hosts choose
//! which source to hand it:
//!
//! - [`EnvironmentConnectionStringSource`] reads `AzureWebJobs<name>` variables
//! - [`InMemoryConnectionStringSource`] serves a fixed map (settings files, tests)
//! - [`ChainedConnectionStringSource`] tries several sources in order
//!
//! [`ServiceBusConnection`] parses the `Endpoint=...;SharedAccessKey...` form
//! used by Service Bus namespaces.

use crate::error::ConnectionStringError;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

#[cfg(test)]
#[path = "connection_string_tests.rs"]
mod tests;

/// Prefix applied to connection string names when reading ambient settings
pub const AMBIENT_PREFIX: &str = "AzureWebJobs";

/// Well-known connection string names
pub struct ConnectionStringNames;

impl ConnectionStringNames {
    /// Name under which the Service Bus connection string is resolved
    pub const SERVICE_BUS: &'static str = "ServiceBus";

    /// Full ambient setting name for a connection string, e.g. `AzureWebJobsServiceBus`
    pub fn ambient_setting(name: &str) -> String {
        format!("{}{}", AMBIENT_PREFIX, name)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Keyed lookup of connection strings supplied by the hosting environment
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionStringSource: Send + Sync {
    /// Look up the connection string registered under `name`
    fn connection_string(&self, name: &str) -> Option<String>;
}

/// Reads connection strings from process environment variables
///
/// The variable consulted is the configured prefix followed by the name, so
/// `ServiceBus` resolves from `AzureWebJobsServiceBus` by default. Variables
/// that are set but empty count as absent.
#[derive(Debug, Clone)]
pub struct EnvironmentConnectionStringSource {
    prefix: String,
}

impl EnvironmentConnectionStringSource {
    pub fn new() -> Self {
        Self::with_prefix(AMBIENT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `name`
    pub fn variable_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl Default for EnvironmentConnectionStringSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStringSource for EnvironmentConnectionStringSource {
    fn connection_string(&self, name: &str) -> Option<String> {
        let variable = self.variable_name(name);
        let value = std::env::var(&variable).ok().filter(|v| !v.is_empty());

        debug!(
            variable = %variable,
            found = value.is_some(),
            "Looked up connection string in environment"
        );

        value
    }
}

/// Connection strings held in memory, looked up case-insensitively
#[derive(Clone, Default)]
pub struct InMemoryConnectionStringSource {
    connection_strings: HashMap<String, String>,
}

impl InMemoryConnectionStringSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a connection string
    pub fn with_connection_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_strings.insert(name.into(), value.into());
        self
    }
}

impl From<HashMap<String, String>> for InMemoryConnectionStringSource {
    fn from(connection_strings: HashMap<String, String>) -> Self {
        Self { connection_strings }
    }
}

impl ConnectionStringSource for InMemoryConnectionStringSource {
    fn connection_string(&self, name: &str) -> Option<String> {
        self.connection_strings
            .get(name)
            .or_else(|| {
                self.connection_strings
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .cloned()
    }
}

impl fmt::Debug for InMemoryConnectionStringSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.connection_strings.keys().collect();
        names.sort();
        f.debug_struct("InMemoryConnectionStringSource")
            .field("names", &names)
            .finish()
    }
}

/// Consults several sources in order; the first one that knows the name wins
#[derive(Clone, Default)]
pub struct ChainedConnectionStringSource {
    sources: Vec<Arc<dyn ConnectionStringSource>>,
}

impl ChainedConnectionStringSource {
    pub fn new(sources: Vec<Arc<dyn ConnectionStringSource>>) -> Self {
        Self { sources }
    }

    /// Append a source consulted after the existing ones
    pub fn then(mut self, source: Arc<dyn ConnectionStringSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl ConnectionStringSource for ChainedConnectionStringSource {
    fn connection_string(&self, name: &str) -> Option<String> {
        self.sources
            .iter()
            .find_map(|source| source.connection_string(name))
    }
}

impl fmt::Debug for ChainedConnectionStringSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedConnectionStringSource")
            .field("sources", &self.sources.len())
            .finish()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parsed Service Bus connection string
///
/// Secrets are held in zeroizing buffers and never appear in `Debug` output.
#[derive(Clone)]
pub struct ServiceBusConnection {
    endpoint: Url,
    shared_access_key_name: Option<String>,
    shared_access_key: Option<Zeroizing<String>>,
    shared_access_signature: Option<Zeroizing<String>>,
    entity_path: Option<String>,
}

impl ServiceBusConnection {
    /// Parse a connection string of the form
    /// `Endpoint=sb://<namespace>/;SharedAccessKeyName=<name>;SharedAccessKey=<key>`
    ///
    /// Keys are case-insensitive, values may contain `=`, and an optional
    /// `EntityPath` pins the connection to a single entity. Credentials are
    /// either a key name and key, or a `SharedAccessSignature`.
    ///
    /// # Errors
    /// - `ConnectionStringError::Missing` - Empty input
    /// - `ConnectionStringError::Malformed` - A segment is not `key=value`
    /// - `ConnectionStringError::MissingField` - Endpoint or credentials absent
    /// - `ConnectionStringError::InvalidEndpoint` - Endpoint is not an `sb://` URL
    pub fn parse(connection_string: &str) -> Result<Self, ConnectionStringError> {
        if connection_string.trim().is_empty() {
            return Err(ConnectionStringError::Missing {
                setting: ConnectionStringNames::ambient_setting(ConnectionStringNames::SERVICE_BUS),
            });
        }

        let mut endpoint = None;
        let mut shared_access_key_name = None;
        let mut shared_access_key = None;
        let mut shared_access_signature = None;
        let mut entity_path = None;

        for (index, segment) in connection_string.split(';').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            // Report the position only; the segment may hold a secret
            let (key, value) =
                segment
                    .split_once('=')
                    .ok_or_else(|| ConnectionStringError::Malformed {
                        message: format!("segment {} is not a key=value pair", index),
                    })?;

            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.to_string()),
                "sharedaccesskeyname" => shared_access_key_name = Some(value.to_string()),
                "sharedaccesskey" => shared_access_key = Some(Zeroizing::new(value.to_string())),
                "sharedaccesssignature" => {
                    shared_access_signature = Some(Zeroizing::new(value.to_string()))
                }
                "entitypath" => entity_path = Some(value.to_string()),
                other => debug!(key = %other, "Ignoring unrecognised connection string key"),
            }
        }

        let endpoint = endpoint.ok_or_else(|| ConnectionStringError::MissingField {
            field: "Endpoint".to_string(),
        })?;
        let endpoint = Self::parse_endpoint(&endpoint)?;

        match (
            &shared_access_key_name,
            &shared_access_key,
            &shared_access_signature,
        ) {
            (Some(_), Some(_), _) | (_, None, Some(_)) => {}
            (Some(_), None, None) => {
                return Err(ConnectionStringError::MissingField {
                    field: "SharedAccessKey".to_string(),
                })
            }
            _ => {
                return Err(ConnectionStringError::MissingField {
                    field: "SharedAccessKeyName".to_string(),
                })
            }
        }

        Ok(Self {
            endpoint,
            shared_access_key_name,
            shared_access_key,
            shared_access_signature,
            entity_path,
        })
    }

    fn parse_endpoint(endpoint: &str) -> Result<Url, ConnectionStringError> {
        let url = Url::parse(endpoint).map_err(|e| ConnectionStringError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if url.scheme() != "sb" {
            return Err(ConnectionStringError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: format!("scheme must be 'sb', found '{}'", url.scheme()),
            });
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConnectionStringError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "endpoint has no namespace host".to_string(),
            });
        }

        Ok(url)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fully qualified namespace host, e.g. `contoso.servicebus.windows.net`
    pub fn namespace(&self) -> &str {
        // Presence of a host is checked during parsing
        self.endpoint.host_str().unwrap_or_default()
    }

    pub fn shared_access_key_name(&self) -> Option<&str> {
        self.shared_access_key_name.as_deref()
    }

    /// Shared access key (only for immediate use)
    pub fn shared_access_key(&self) -> Option<&str> {
        self.shared_access_key.as_ref().map(|key| key.as_str())
    }

    /// Pre-issued shared access signature (only for immediate use)
    pub fn shared_access_signature(&self) -> Option<&str> {
        self.shared_access_signature
            .as_ref()
            .map(|signature| signature.as_str())
    }

    /// Entity the connection string is scoped to, if any
    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }
}

impl fmt::Debug for ServiceBusConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusConnection")
            .field("endpoint", &self.endpoint.as_str())
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field(
                "shared_access_key",
                if self.shared_access_key.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field(
                "shared_access_signature",
                if self.shared_access_signature.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field("entity_path", &self.entity_path)
            .finish()
    }
}
