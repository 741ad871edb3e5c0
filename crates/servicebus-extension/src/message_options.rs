//! Receive tuning for message handlers.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "message_options_tests.rs"]
mod tests;

/// Default number of messages delivered to handlers in parallel
pub const DEFAULT_MAX_CONCURRENT_CALLS: u32 = 16;

/// Options used by message receivers when delivering messages to handlers
///
/// Owned by [`ServiceBusConfiguration`](crate::ServiceBusConfiguration) and
/// replaceable wholesale at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageOptions {
    /// Maximum number of concurrent handler invocations per receiver
    pub max_concurrent_calls: u32,

    /// Complete messages automatically once the handler returns successfully
    pub auto_complete: bool,

    /// How long the receiver keeps renewing a message lock, in seconds
    pub auto_renew_timeout_seconds: u64,
}

impl MessageOptions {
    /// Options with the given concurrency limit and default everything else
    pub fn with_max_concurrent_calls(max_concurrent_calls: u32) -> Self {
        Self {
            max_concurrent_calls,
            ..Self::default()
        }
    }

    /// Lock renewal window as a [`Duration`]
    pub fn auto_renew_timeout(&self) -> Duration {
        Duration::from_secs(self.auto_renew_timeout_seconds)
    }

    /// Check that the options can drive a receiver
    ///
    /// Setting options on a configuration never validates; this is applied to
    /// options that come from external settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_calls == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_concurrent_calls".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            auto_complete: true,
            auto_renew_timeout_seconds: 5 * 60,
        }
    }
}
