//! Write-triggered cache invalidation.
//!
//! Runs after a review write has been committed. While the cache is not
//! live every call is a no-op and stale entries age out by TTL.

use std::collections::BTreeSet;

use serde::Serialize;

use super::connection::ConnectionManager;
use super::keys::KeyCodec;
use crate::error::{CacheError, CacheResult};

/// Outcome of one invalidation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Keys sent to the store
    pub attempted: usize,
    /// Keys that existed and were removed
    pub deleted: u64,
    /// Cache was not live, nothing was sent
    pub skipped: bool,
}

impl InvalidationReport {
    pub const fn skipped() -> Self {
        Self {
            attempted: 0,
            deleted: 0,
            skipped: true,
        }
    }
}

/// Deletes cached reads affected by a review write.
#[derive(Debug, Clone)]
pub struct InvalidationService {
    connection: ConnectionManager,
    keys: KeyCodec,
}

impl InvalidationService {
    pub const fn new(connection: ConnectionManager, keys: KeyCodec) -> Self {
        Self { connection, keys }
    }

    /// Drop every cached read of `content_id`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Invalidation`] when the batch delete fails. Residual
    /// entries still expire by TTL.
    pub async fn invalidate_content(&self, content_id: &str) -> CacheResult<InvalidationReport> {
        self.invalidate(self.keys.content_invalidation_keys(content_id))
            .await
    }

    /// Drop every cached entry scoped to `user_id`.
    ///
    /// # Errors
    ///
    /// Same as [`invalidate_content`](Self::invalidate_content).
    pub async fn invalidate_user(&self, user_id: &str) -> CacheResult<InvalidationReport> {
        self.invalidate(self.keys.user_invalidation_keys(user_id))
            .await
    }

    /// Invalidate after a successful write, logging instead of failing.
    pub async fn invalidate_after_write(&self, content_id: &str, user_id: Option<&str>) {
        match self.invalidate_content(content_id).await {
            Ok(report) => tracing::debug!(
                content_id,
                attempted = report.attempted,
                deleted = report.deleted,
                skipped = report.skipped,
                "Invalidated content cache"
            ),
            Err(err) => tracing::warn!(
                content_id,
                error = %err,
                "Content cache invalidation failed, entries will expire by TTL"
            ),
        }

        if let Some(user_id) = user_id.filter(|id| !id.is_empty()) {
            match self.invalidate_user(user_id).await {
                Ok(report) => tracing::debug!(
                    user_id,
                    attempted = report.attempted,
                    deleted = report.deleted,
                    skipped = report.skipped,
                    "Invalidated user cache"
                ),
                Err(err) => tracing::warn!(
                    user_id,
                    error = %err,
                    "User cache invalidation failed, entries will expire by TTL"
                ),
            }
        }
    }

    async fn invalidate(&self, keys: BTreeSet<String>) -> CacheResult<InvalidationReport> {
        if !self.connection.is_live() {
            return Ok(InvalidationReport::skipped());
        }
        if keys.is_empty() {
            return Ok(InvalidationReport::default());
        }

        let keys: Vec<String> = keys.into_iter().collect();
        let attempted = keys.len();
        let deleted = self
            .connection
            .delete_many(&keys)
            .await
            .map_err(|err| CacheError::Invalidation {
                attempted,
                message: err.to_string(),
            })?;

        Ok(InvalidationReport {
            attempted,
            deleted,
            skipped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::connection::{CacheBackend, ConnectionConfig};
    use crate::cache::memory::{MemoryConnector, MemoryStore};
    use review_domain::MediaType;
    use std::sync::Arc;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(900);

    async fn connected(store: &Arc<MemoryStore>) -> (ConnectionManager, InvalidationService) {
        let connection = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::clone(store))),
            ConnectionConfig::default(),
        );
        connection.connect().await.unwrap();
        let service = InvalidationService::new(connection.clone(), KeyCodec::new("ns"));
        (connection, service)
    }

    #[tokio::test]
    async fn removes_every_read_key_for_content() {
        let store = Arc::new(MemoryStore::new());
        let (_connection, service) = connected(&store).await;
        let keys = KeyCodec::new("ns");
        for media in MediaType::ALL {
            store.set_ex(&keys.read_key(media, "c1"), b"[]", TTL).await.unwrap();
        }
        store.set_ex(&keys.read_key(MediaType::Movie, "c2"), b"[]", TTL).await.unwrap();

        let report = service.invalidate_content("c1").await.unwrap();

        assert_eq!(report.attempted, MediaType::ALL.len());
        assert_eq!(report.deleted, MediaType::ALL.len() as u64);
        assert!(!report.skipped);
        assert!(store.contains_key(&keys.read_key(MediaType::Movie, "c2")));
    }

    #[tokio::test]
    async fn content_without_entries_is_a_quiet_no_op() {
        let store = Arc::new(MemoryStore::new());
        let (_connection, service) = connected(&store).await;

        let report = service.invalidate_content("never-cached").await.unwrap();

        assert_eq!(report.deleted, 0);
        assert!(!report.skipped);
    }

    #[tokio::test]
    async fn user_invalidation_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (_connection, service) = connected(&store).await;

        let report = service.invalidate_user("u1").await.unwrap();

        assert_eq!(report, InvalidationReport::default());
    }

    #[tokio::test]
    async fn skipped_while_not_live() {
        let store = Arc::new(MemoryStore::new());
        let connection = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::clone(&store))),
            ConnectionConfig::default(),
        );
        let service = InvalidationService::new(connection, KeyCodec::new("ns"));

        let report = service.invalidate_content("c1").await.unwrap();

        assert_eq!(report, InvalidationReport::skipped());
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_raised_by_after_write() {
        let store = Arc::new(MemoryStore::new());
        let (connection, service) = connected(&store).await;
        store.set_available(false);

        let err = service.invalidate_content("c1").await.unwrap_err();
        assert!(matches!(err, CacheError::Invalidation { attempted: 2, .. }));
        assert!(!connection.is_live());

        // Now a no-op: the failed delete marked the connection dropped.
        service.invalidate_after_write("c1", Some("u1")).await;
    }
}
