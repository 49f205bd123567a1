//! Cache connection health for the `/health` endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::connection::{ConnectionManager, ConnectionState};

/// Point-in-time view of the cache connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub state: ConnectionState,
    pub since: DateTime<Utc>,
    pub live: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Read-only window onto [`ConnectionManager`] state.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    connection: ConnectionManager,
}

impl HealthReporter {
    pub const fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub fn status(&self) -> CacheHealth {
        let status = self.connection.status();
        CacheHealth {
            live: status.state.is_live(),
            state: status.state,
            since: status.since,
            attempts: status.attempts,
            last_error: status.last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::connection::ConnectionConfig;
    use crate::cache::memory::{MemoryConnector, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn reflects_connection_transitions() {
        let store = Arc::new(MemoryStore::new());
        let connection = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::clone(&store))),
            ConnectionConfig::default(),
        );
        let health = HealthReporter::new(connection.clone());

        let initial = health.status();
        assert_eq!(initial.state, ConnectionState::Disconnected);
        assert!(!initial.live);

        connection.connect().await.unwrap();
        let connected = health.status();
        assert_eq!(connected.state, ConnectionState::Connected);
        assert!(connected.live);
        assert!(connected.since >= initial.since);

        store.set_available(false);
        let _ = connection.ping().await;
        let dropped = health.status();
        assert_eq!(dropped.state, ConnectionState::Disconnected);
        assert!(dropped.last_error.is_some());
    }

    #[test]
    fn serializes_state_for_health_body() {
        let connection = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new()))),
            ConnectionConfig::default(),
        );
        let json = serde_json::to_value(HealthReporter::new(connection).status()).unwrap();

        assert_eq!(json["state"], "DISCONNECTED");
        assert_eq!(json["live"], false);
        assert!(json["lastError"].is_null());
    }
}
