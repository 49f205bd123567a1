//! # Review Persistence Library
//!
//! Storage and cache-aside plumbing for the review service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HTTP Layer (review-api)                  │
//! │        cache-aside middleware · write handlers · /health     │
//! └─────────────────────────────────────────────────────────────┘
//!            │ reads             │ writes              │
//!            ▼                   ▼                     ▼
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │     KeyCodec     │  │ InvalidationSvc  │  │  HealthReporter  │
//! └──────────────────┘  └──────────────────┘  └──────────────────┘
//!            │                   │                     │
//!            ▼                   ▼                     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ConnectionManager                         │
//! │       (state machine, retry loop, bounded operations)        │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │   Redis / in-process    │   │   ReviewRepository           │
//! │   (cached review lists) │   │   ScyllaDB (source of truth) │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `scylla`: Enable ScyllaDB review store (default)
//! - `redis`: Enable Redis cache backend (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use review_persistence::cache::{
//!     ConnectionConfig, ConnectionManager, InvalidationService, KeyCodec, RedisConnector,
//! };
//!
//! let connection = ConnectionManager::new(
//!     Arc::new(RedisConnector::new("redis://127.0.0.1:6379")),
//!     ConnectionConfig::default(),
//! );
//! connection.start();
//!
//! let invalidation = InvalidationService::new(connection.clone(), KeyCodec::new("review-service"));
//! invalidation.invalidate_after_write("c1", Some("u1")).await;
//!
//! connection.close().await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
pub mod repository;

// Re-export commonly used types
pub use cache::{
    CacheHealth, ConnectionConfig, ConnectionManager, ConnectionState, ConnectionStatus,
    HealthReporter, InvalidationReport, InvalidationService, KeyCodec,
};
pub use error::{CacheError, CacheResult, PersistenceError, Result};
pub use repository::{InMemoryReviewRepository, ReviewRepository, SharedReviewRepository};
#[cfg(feature = "scylla")]
pub use repository::{ScyllaClient, ScyllaConfig, ScyllaReviewRepository};
