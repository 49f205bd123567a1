//! # Review Service API
//!
//! HTTP API for content reviews with a cache-aside read path.
//!
//! ## Routes
//!
//! - `GET /test`: liveness text
//! - `GET /health`: service status plus cache connection health
//! - `GET /{mediaType}/{contentId}`: reviews for one piece of content (cached)
//! - `POST /add`: add a review, then invalidate cached reads for its content
//! - `POST /delete`: delete a user's review, then invalidate likewise
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Axum HTTP Server                         │
//! │            (TraceLayer · CORS · route handlers)             │
//! └─────────────────────────────────────────────────────────────┘
//!          │ GET /{mediaType}/{contentId}        │ POST /add, /delete
//!          ▼                                     ▼
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │  cache_aside middleware  │      │   InvalidationService    │
//! └──────────────────────────┘      └──────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     Redis Cache         │   │        ScyllaDB              │
//! │  (Review lists, TTL)    │   │   (Source of Truth)          │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use context::{ApiContext, ApiContextBuilder};
pub use error::{ApiError, ApiResult};
pub use middleware::{CACHE_STATUS_HEADER, CacheAside, CacheStats, cache_aside};

/// Build the Axum router
pub fn build_router(ctx: ApiContext) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    // Only the review read route goes through the cache
    let reads = Router::new()
        .route(
            "/{media_type}/{content_id}",
            get(handlers::get_content_reviews),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            ctx.cache.clone(),
            cache_aside,
        ));

    Router::new()
        .route("/test", get(handlers::test_endpoint))
        .route("/health", get(handlers::health))
        .route("/add", post(handlers::add_review))
        .route("/delete", post(handlers::delete_review))
        .merge(reads)
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
