//! Task service configuration.

use std::env;

use common::{
    DatabaseConfig, DocumentStoreConfig, PersistenceBackend, PersistenceConfig, ServiceConfig,
};

/// Task service configuration.
#[derive(Debug, Clone)]
pub struct TaskServiceConfig {
    pub service: ServiceConfig,
    /// Backend selection and connection settings
    pub persistence: PersistenceConfig,
}

impl TaskServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to
    /// the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let database_defaults = defaults.persistence.database;
        let store_defaults = defaults.persistence.document_store;

        let backend = lookup("PERSISTENCE_BACKEND")
            .and_then(|raw| match raw.parse::<PersistenceBackend>() {
                Ok(backend) => Some(backend),
                Err(err) => {
                    tracing::warn!("{}, falling back to {}", err, PersistenceBackend::default());
                    None
                }
            })
            .unwrap_or_default();

        Self {
            service: ServiceConfig {
                service_name: lookup("SERVICE_NAME").unwrap_or(defaults.service.service_name),
                log_level: lookup("RUST_LOG").unwrap_or(defaults.service.log_level),
            },
            persistence: PersistenceConfig {
                backend,
                database: DatabaseConfig {
                    url: lookup("TASK_SERVICE_DATABASE_URL")
                        .or_else(|| lookup("DATABASE_URL"))
                        .unwrap_or(database_defaults.url),
                    max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(database_defaults.max_connections),
                    min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(database_defaults.min_connections),
                },
                document_store: DocumentStoreConfig {
                    url: lookup("TASK_SERVICE_REDIS_URL")
                        .or_else(|| lookup("REDIS_URL"))
                        .unwrap_or(store_defaults.url),
                    key_prefix: lookup("DOCUMENT_KEY_PREFIX").unwrap_or(store_defaults.key_prefix),
                },
                operation_timeout_ms: lookup("STORE_OPERATION_TIMEOUT_MS")
                    .and_then(|ms| ms.parse().ok())
                    .filter(|ms| *ms > 0),
            },
        }
    }
}

impl Default for TaskServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "task-service".to_string(),
                log_level: "info".to_string(),
            },
            persistence: PersistenceConfig::default(),
        }
    }
}
