//! Persistence layer error types

use thiserror::Error;

/// Review store errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ScyllaDB error: {0}")]
    Scylla(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Query timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<review_domain::DomainError> for PersistenceError {
    fn from(err: review_domain::DomainError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        Self::Scylla(err.to_string())
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        Self::Scylla(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Cache subsystem errors.
///
/// None of these ever reach an HTTP caller: reads degrade to a miss and
/// invalidation degrades to a no-op.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Store unreachable or connection dropped.
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// A single command failed while the connection was believed live.
    #[error("Cache {op} failed: {message}")]
    Operation { op: &'static str, message: String },

    #[error("Cache {op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },

    #[error("Invalidation of {attempted} keys failed: {message}")]
    Invalidation { attempted: usize, message: String },

    #[error("Cache store not connected")]
    NotConnected,

    #[error("Cache connection manager closed")]
    Closed,
}

impl CacheError {
    /// Whether this error means the connection itself is gone, as opposed
    /// to one command failing on a healthy connection.
    pub const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub(crate) fn operation(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Operation {
            op,
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Connection(err.to_string())
        } else {
            Self::operation("redis", err)
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_errors_count_as_connection_loss() {
        assert!(CacheError::Connection("refused".into()).is_connection_loss());
        assert!(!CacheError::operation("get", "WRONGTYPE").is_connection_loss());
        assert!(!CacheError::NotConnected.is_connection_loss());
        assert!(
            !CacheError::Timeout {
                op: "set",
                timeout_ms: 2000
            }
            .is_connection_loss()
        );
    }

    #[test]
    fn domain_errors_surface_as_invalid_query() {
        let err: PersistenceError = review_domain::DomainError::MissingField("userId").into();
        assert!(matches!(err, PersistenceError::InvalidQuery(_)));
    }
}
