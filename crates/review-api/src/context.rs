//! # API Context
//!
//! Application state and dependency injection for HTTP handlers.

use std::time::Duration;

use review_persistence::{
    ConnectionManager, HealthReporter, InvalidationService, KeyCodec, SharedReviewRepository,
};

use crate::middleware::{CacheAside, DEFAULT_MAX_BODY_BYTES, DEFAULT_TTL};

/// Application context shared across all handlers
#[derive(Clone)]
pub struct ApiContext {
    /// Review store (source of truth)
    pub reviews: SharedReviewRepository,

    /// Cache connection lifecycle
    pub connection: ConnectionManager,

    /// Read-path cache state
    pub cache: CacheAside,

    /// Post-write cache invalidation
    pub invalidation: InvalidationService,

    /// Cache connection health
    pub health: HealthReporter,
}

impl ApiContext {
    /// Wire every cache collaborator onto one connection and key scheme
    pub fn new(
        reviews: SharedReviewRepository,
        connection: ConnectionManager,
        keys: KeyCodec,
        ttl: Duration,
        max_body_bytes: usize,
    ) -> Self {
        let cache = CacheAside::new(connection.clone(), keys.clone())
            .with_ttl(ttl)
            .with_max_body_bytes(max_body_bytes);

        Self {
            reviews,
            invalidation: InvalidationService::new(connection.clone(), keys),
            health: HealthReporter::new(connection.clone()),
            cache,
            connection,
        }
    }

    pub fn builder() -> ApiContextBuilder {
        ApiContextBuilder::new()
    }
}

/// Builder for `ApiContext`
pub struct ApiContextBuilder {
    reviews: Option<SharedReviewRepository>,
    connection: Option<ConnectionManager>,
    namespace: String,
    ttl: Duration,
    max_body_bytes: usize,
}

impl ApiContextBuilder {
    pub fn new() -> Self {
        Self {
            reviews: None,
            connection: None,
            namespace: "review-service".to_string(),
            ttl: DEFAULT_TTL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    #[must_use]
    pub fn with_reviews(mut self, reviews: SharedReviewRepository) -> Self {
        self.reviews = Some(reviews);
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionManager) -> Self {
        self.connection = Some(connection);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// # Errors
    ///
    /// Fails when the repository or the cache connection is missing, or the
    /// TTL is zero.
    pub fn build(self) -> Result<ApiContext, &'static str> {
        let reviews = self.reviews.ok_or("Review repository required")?;
        let connection = self.connection.ok_or("Cache connection required")?;
        if self.ttl.is_zero() {
            return Err("Cache TTL must be greater than zero");
        }

        Ok(ApiContext::new(
            reviews,
            connection,
            KeyCodec::new(self.namespace),
            self.ttl,
            self.max_body_bytes,
        ))
    }
}

impl Default for ApiContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
