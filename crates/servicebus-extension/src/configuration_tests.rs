//! Tests for the Service Bus configuration holder.

use super::*;
use crate::connection_string::{InMemoryConnectionStringSource, MockConnectionStringSource};
use crate::error::ConnectionStringError;
use crate::provider::MessagingProvider;
use std::sync::atomic::{AtomicUsize, Ordering};

const VALID: &str = "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=a2V5";

// ============================================================================
// Test Doubles
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
struct TestProvider {
    connection_string: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("factory refused connection string")]
struct TestFactoryError;

/// Counts provider constructions; fails when asked to
#[derive(Default)]
struct CountingFactory {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingFactory {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl MessagingProviderFactory for CountingFactory {
    type Provider = TestProvider;
    type Error = TestFactoryError;

    fn create(&self, connection_string: Option<&str>) -> Result<TestProvider, TestFactoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TestFactoryError);
        }
        Ok(TestProvider {
            connection_string: connection_string.map(str::to_string),
        })
    }
}

fn ambient(value: Option<&'static str>) -> Arc<dyn ConnectionStringSource> {
    let mut source = MockConnectionStringSource::new();
    source
        .expect_connection_string()
        .returning(move |_| value.map(str::to_string));
    Arc::new(source)
}

fn configuration(
    ambient_value: Option<&'static str>,
) -> (ServiceBusConfiguration<CountingFactory>, Arc<AtomicUsize>) {
    let factory = CountingFactory::default();
    let calls = Arc::clone(&factory.calls);
    (
        ServiceBusConfiguration::with_components(ambient(ambient_value), factory),
        calls,
    )
}

// ============================================================================
// Construction
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_new_configuration_has_default_concurrency() {
        let (config, _) = configuration(None);

        assert_eq!(config.message_options().max_concurrent_calls, 16);
        assert!(!config.is_provider_resolved());
    }

    #[test]
    fn test_default_configuration_uses_service_bus_factory() {
        let config = ServiceBusConfiguration::default();

        assert_eq!(config.message_options(), MessageOptions::default());
        assert!(!config.is_provider_resolved());
    }

    #[test]
    fn test_construction_does_not_consult_ambient_source() {
        let mut source = MockConnectionStringSource::new();
        source.expect_connection_string().never();

        let config = ServiceBusConfiguration::with_components(
            Arc::new(source),
            CountingFactory::default(),
        );

        assert_eq!(config.message_options().max_concurrent_calls, 16);
    }
}

// ============================================================================
// Connection String
// ============================================================================

mod connection_string_tests {
    use super::*;

    #[test]
    fn test_explicit_connection_string_skips_ambient_source() {
        // Arrange
        let mut source = MockConnectionStringSource::new();
        source.expect_connection_string().never();
        let config = ServiceBusConfiguration::with_components(
            Arc::new(source),
            CountingFactory::default(),
        );

        // Act
        config.set_connection_string(Some(VALID.to_string())).unwrap();

        // Assert
        assert_eq!(config.connection_string().as_deref(), Some(VALID));
    }

    #[test]
    fn test_ambient_connection_string_resolved_once() {
        // Arrange
        let mut source = MockConnectionStringSource::new();
        source
            .expect_connection_string()
            .withf(|name| name == "ServiceBus")
            .times(1)
            .returning(|_| Some(VALID.to_string()));
        let config = ServiceBusConfiguration::with_components(
            Arc::new(source),
            CountingFactory::default(),
        );

        // Act
        let first = config.connection_string();
        let second = config.connection_string();

        // Assert
        assert_eq!(first.as_deref(), Some(VALID));
        assert_eq!(second, first);
    }

    #[test]
    fn test_absent_ambient_connection_string_is_cached() {
        let mut source = MockConnectionStringSource::new();
        source
            .expect_connection_string()
            .times(1)
            .returning(|_| None);
        let config = ServiceBusConfiguration::with_components(
            Arc::new(source),
            CountingFactory::default(),
        );

        assert_eq!(config.connection_string(), None);
        assert_eq!(config.connection_string(), None);
    }

    #[test]
    fn test_explicit_none_suppresses_ambient_resolution() {
        let mut source = MockConnectionStringSource::new();
        source.expect_connection_string().never();
        let config = ServiceBusConfiguration::with_components(
            Arc::new(source),
            CountingFactory::default(),
        );

        config.set_connection_string(None).unwrap();

        assert_eq!(config.connection_string(), None);
    }

    #[test]
    fn test_connection_string_can_be_replaced_before_provider() {
        let (config, _) = configuration(Some("ambient"));

        assert_eq!(config.connection_string().as_deref(), Some("ambient"));
        config.set_connection_string(Some("first".to_string())).unwrap();
        config.set_connection_string(Some("second".to_string())).unwrap();

        assert_eq!(config.connection_string().as_deref(), Some("second"));
    }

    #[test]
    fn test_set_connection_string_fails_after_provider_created() {
        // Arrange
        let (config, _) = configuration(None);
        config.set_connection_string(Some("before".to_string())).unwrap();
        config.messaging_provider().unwrap();

        // Act
        let result = config.set_connection_string(Some("after".to_string()));

        // Assert
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidOperation { .. })
        ));
        assert_eq!(config.connection_string().as_deref(), Some("before"));
    }

    #[test]
    fn test_set_connection_string_fails_after_provider_set() {
        let (config, calls) = configuration(None);
        config
            .set_messaging_provider(Some(Arc::new(TestProvider {
                connection_string: None,
            })))
            .unwrap();

        let result = config.set_connection_string(Some("after".to_string()));

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidOperation { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

// ============================================================================
// Messaging Provider
// ============================================================================

mod provider_tests {
    use super::*;

    #[test]
    fn test_provider_created_once_and_cached() {
        // Arrange
        let (config, calls) = configuration(Some("ambient"));

        // Act
        let first = config.messaging_provider().unwrap();
        let second = config.messaging_provider().unwrap();

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(config.is_provider_resolved());
    }

    #[test]
    fn test_provider_built_from_current_connection_string() {
        let (config, _) = configuration(Some("ambient"));
        config.set_connection_string(Some("explicit".to_string())).unwrap();

        let provider = config.messaging_provider().unwrap();

        assert_eq!(provider.connection_string.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_provider_resolves_ambient_connection_string() {
        let (config, _) = configuration(Some("ambient"));

        let provider = config.messaging_provider().unwrap();

        assert_eq!(provider.connection_string.as_deref(), Some("ambient"));
    }

    #[test]
    fn test_provider_receives_absent_connection_string() {
        let (config, calls) = configuration(None);

        let provider = config.messaging_provider().unwrap();

        assert_eq!(provider.connection_string, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_provider_is_returned_as_is() {
        // Arrange
        let (config, calls) = configuration(Some("ambient"));
        let explicit = Arc::new(TestProvider {
            connection_string: Some("custom".to_string()),
        });

        // Act
        config
            .set_messaging_provider(Some(Arc::clone(&explicit)))
            .unwrap();
        let provider = config.messaging_provider().unwrap();

        // Assert
        assert!(Arc::ptr_eq(&provider, &explicit));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_set_none_provider_is_invalid_argument() {
        // Arrange
        let (config, calls) = configuration(Some("ambient"));

        // Act
        let result = config.set_messaging_provider(None);

        // Assert
        match result {
            Err(ConfigurationError::InvalidArgument { argument, .. }) => {
                assert_eq!(argument, "value")
            }
            other => panic!("expected invalid argument, got {:?}", other),
        }
        assert!(!config.is_provider_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(config.set_connection_string(Some("still-open".to_string())).is_ok());
    }

    #[test]
    fn test_explicit_provider_replaces_created_provider() {
        let (config, _) = configuration(Some("ambient"));
        let created = config.messaging_provider().unwrap();
        let replacement = Arc::new(TestProvider {
            connection_string: Some("replacement".to_string()),
        });

        config
            .set_messaging_provider(Some(Arc::clone(&replacement)))
            .unwrap();

        let current = config.messaging_provider().unwrap();
        assert!(Arc::ptr_eq(&current, &replacement));
        assert!(!Arc::ptr_eq(&current, &created));
    }

    #[test]
    fn test_factory_error_propagates_and_leaves_lock_open() {
        // Arrange
        let factory = CountingFactory::failing();
        let calls = Arc::clone(&factory.calls);
        let config = ServiceBusConfiguration::with_components(ambient(Some("ambient")), factory);

        // Act
        let result = config.messaging_provider();

        // Assert
        assert!(matches!(result, Err(TestFactoryError)));
        assert!(!config.is_provider_resolved());
        assert!(config.set_connection_string(Some("fixed".to_string())).is_ok());

        // A later read retries construction
        assert!(config.messaging_provider().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_reads_create_one_provider() {
        // Arrange
        let (config, calls) = configuration(Some("ambient"));

        // Act
        let providers: Vec<Arc<TestProvider>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| config.messaging_provider().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(providers.iter().all(|p| Arc::ptr_eq(p, &providers[0])));
    }
}

// ============================================================================
// Default Service Bus Factory
// ============================================================================

mod service_bus_factory_tests {
    use super::*;

    fn service_bus_configuration(ambient: InMemoryConnectionStringSource) -> ServiceBusConfiguration {
        ServiceBusConfiguration::with_components(Arc::new(ambient), ServiceBusProviderFactory)
    }

    #[test]
    fn test_default_factory_builds_from_ambient_connection_string() {
        let config = service_bus_configuration(
            InMemoryConnectionStringSource::new().with_connection_string("ServiceBus", VALID),
        );

        let provider: Arc<MessagingProvider> = config.messaging_provider().unwrap();

        assert_eq!(provider.namespace(), "contoso.servicebus.windows.net");
    }

    #[test]
    fn test_default_factory_reports_missing_connection_string() {
        let config = service_bus_configuration(InMemoryConnectionStringSource::new());

        let result = config.messaging_provider();

        assert!(matches!(result, Err(ConnectionStringError::Missing { .. })));
        assert!(!config.is_provider_resolved());
    }
}

// ============================================================================
// Message Options
// ============================================================================

mod message_options_tests {
    use super::*;

    #[test]
    fn test_set_message_options_round_trips() {
        let (config, _) = configuration(None);
        let options = MessageOptions {
            max_concurrent_calls: 3,
            auto_complete: false,
            auto_renew_timeout_seconds: 60,
        };

        config.set_message_options(options);

        assert_eq!(config.message_options(), options);
    }

    #[test]
    fn test_message_options_can_change_after_provider_created() {
        let (config, _) = configuration(Some("ambient"));
        config.messaging_provider().unwrap();
        let options = MessageOptions::with_max_concurrent_calls(64);

        config.set_message_options(options);

        assert_eq!(config.message_options(), options);
    }
}

// ============================================================================
// Settings and Debug
// ============================================================================

mod settings_tests {
    use super::*;

    #[test]
    fn test_apply_settings_sets_connection_string_and_options() {
        let (config, _) = configuration(Some("ambient"));
        let settings = ServiceBusSettings {
            connection_string: Some("from-settings".to_string()),
            message_options: MessageOptions::with_max_concurrent_calls(8),
            ..Default::default()
        };

        config.apply_settings(&settings).unwrap();

        assert_eq!(config.connection_string().as_deref(), Some("from-settings"));
        assert_eq!(config.message_options().max_concurrent_calls, 8);
    }

    #[test]
    fn test_apply_settings_without_connection_string_keeps_ambient() {
        let (config, _) = configuration(Some("ambient"));

        config
            .apply_settings(&ServiceBusSettings::default())
            .unwrap();

        assert_eq!(config.connection_string().as_deref(), Some("ambient"));
    }

    #[test]
    fn test_apply_settings_rejects_invalid_options() {
        let (config, _) = configuration(None);
        let settings = ServiceBusSettings {
            message_options: MessageOptions::with_max_concurrent_calls(0),
            ..Default::default()
        };

        let result = config.apply_settings(&settings);

        assert!(matches!(result, Err(ConfigurationError::Validation(_))));
        assert_eq!(config.message_options().max_concurrent_calls, 16);
    }

    #[test]
    fn test_apply_settings_after_lock_leaves_options_unchanged() {
        let (config, _) = configuration(Some("ambient"));
        config.messaging_provider().unwrap();
        let settings = ServiceBusSettings {
            connection_string: Some("late".to_string()),
            message_options: MessageOptions::with_max_concurrent_calls(2),
            ..Default::default()
        };

        let result = config.apply_settings(&settings);

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidOperation { .. })
        ));
        assert_eq!(config.message_options().max_concurrent_calls, 16);
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let (config, _) = configuration(None);
        config.set_connection_string(Some(VALID.to_string())).unwrap();

        let output = format!("{:?}", config);

        assert!(output.contains("<REDACTED>"));
        assert!(!output.contains("a2V5"));
        assert!(output.contains("provider_resolved: false"));
    }
}
