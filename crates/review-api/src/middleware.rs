//! # Cache-Aside Middleware
//!
//! Serves `GET /{mediaType}/{contentId}` from the cache when possible and
//! populates it from successful handler responses otherwise. Every cache
//! failure degrades to calling the handler; none of them reach the client.
//!
//! ```text
//!   request ──► live? ──no──► handler (bypass)
//!                 │yes
//!                 ▼
//!           GET read key ──hit──► 200 + x-cache: HIT
//!                 │miss / error
//!                 ▼
//!              handler ──2xx & fits──► SET key EX ttl ──► x-cache: MISS
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::{Body, HttpBody as _};
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use review_domain::MediaType;
use review_persistence::{ConnectionManager, KeyCodec};

use crate::error::ApiError;

/// Response header reporting the cache outcome.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Default lifetime of a cached review list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// Default ceiling for a cacheable response body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// STATS
// =============================================================================

/// Hit and miss counters surfaced on `/health`.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("review_cache_hit_total").increment(1);
        self.publish_ratio();
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("review_cache_miss_total").increment(1);
        self.publish_ratio();
    }

    fn publish_ratio(&self) {
        gauge!("review_cache_hit_ratio").set(self.snapshot().hit_ratio);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        #[allow(clippy::cast_precision_loss)]
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStatsSnapshot {
            hits,
            misses,
            hit_ratio,
        }
    }
}

// =============================================================================
// CACHE-ASIDE STATE
// =============================================================================

/// State for [`cache_aside`].
#[derive(Debug, Clone)]
pub struct CacheAside {
    connection: ConnectionManager,
    keys: KeyCodec,
    ttl: Duration,
    max_body_bytes: usize,
    stats: Arc<CacheStats>,
}

impl CacheAside {
    pub fn new(connection: ConnectionManager, keys: KeyCodec) -> Self {
        Self {
            connection,
            keys,
            ttl: DEFAULT_TTL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            stats: Arc::default(),
        }
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

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Cache key for a read request, or `None` when the path does not name
    /// a known media type.
    async fn read_key(&self, parts: &mut axum::http::request::Parts) -> Option<String> {
        let Path((media_type, content_id)) =
            Path::<(String, String)>::from_request_parts(parts, &()).await.ok()?;
        let media_type = media_type.parse::<MediaType>().ok()?;
        Some(self.keys.read_key(media_type, &content_id))
    }

    /// Buffer a handler response and store it under `key` when cacheable.
    async fn populate(&self, key: &str, response: Response) -> Response {
        if !response.status().is_success() {
            debug!(status = %response.status(), "Not caching unsuccessful response");
            return response;
        }

        let too_large = response
            .body()
            .size_hint()
            .upper()
            .is_none_or(|len| len > self.max_body_bytes as u64);
        if too_large {
            debug!(max = self.max_body_bytes, "Response too large to cache");
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return ApiError::Internal(format!("failed to buffer response body: {err}"))
                    .into_response();
            }
        };

        match self.connection.set(key, &bytes, self.ttl).await {
            Ok(()) => debug!(ttl_secs = self.ttl.as_secs(), "Stored response in cache"),
            Err(err) => {
                counter!("review_cache_store_error_total").increment(1);
                warn!(error = %err, "Failed to store response in cache");
            }
        }

        Response::from_parts(parts, Body::from(bytes))
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Cache-aside wrapper for the review read route.
#[instrument(
    name = "cache_aside",
    skip_all,
    fields(path = %request.uri().path(), key = tracing::field::Empty)
)]
pub async fn cache_aside(State(cache): State<CacheAside>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    if !cache.connection.is_live() {
        counter!("review_cache_bypass_total").increment(1);
        debug!("Cache not live, bypassing");
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let key = cache.read_key(&mut parts).await;
    let request = Request::from_parts(parts, body);

    let Some(key) = key else {
        return next.run(request).await;
    };
    tracing::Span::current().record("key", key.as_str());

    match cache.connection.get(&key).await {
        Ok(Some(payload)) => {
            cache.stats.record_hit();
            debug!(bytes = payload.len(), "Cache hit");
            return cached_response(payload);
        }
        Ok(None) => debug!("Cache miss"),
        Err(err) => warn!(error = %err, "Cache lookup failed, falling through"),
    }

    cache.stats.record_miss();
    let mut response = cache.populate(&key, next.run(request).await).await;
    response
        .headers_mut()
        .insert(HeaderName::from_static(CACHE_STATUS_HEADER), HeaderValue::from_static("MISS"));
    response
}

fn cached_response(payload: Vec<u8>) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        payload,
    )
        .into_response();
    response
        .headers_mut()
        .insert(HeaderName::from_static(CACHE_STATUS_HEADER), HeaderValue::from_static("HIT"));
    response
}
