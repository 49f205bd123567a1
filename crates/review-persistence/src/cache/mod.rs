//! # Cache Module
//!
//! Cache-aside plumbing for review reads: connection lifecycle, key
//! derivation, invalidation and health.

pub mod connection;
pub mod health;
pub mod invalidation;
pub mod keys;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_client;

pub use connection::{
    CacheBackend, ConnectionConfig, ConnectionManager, ConnectionState, ConnectionStatus,
    Connector, SharedBackend,
};
pub use health::{CacheHealth, HealthReporter};
pub use invalidation::{InvalidationReport, InvalidationService};
pub use keys::KeyCodec;
pub use memory::{MemoryConnector, MemoryStore};
#[cfg(feature = "redis")]
pub use redis_client::{RedisBackend, RedisConnector};
