//! # Service Configuration
//!
//! Environment-based configuration, read once at startup.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use review_persistence::ConnectionConfig;

/// Longest accepted cache TTL (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Review service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub server_addr: SocketAddr,

    /// Logging level (used when `RUST_LOG` is unset)
    pub log_level: String,

    /// Where reviews are persisted
    pub storage: StorageBackend,

    /// ScyllaDB configuration
    pub scylla: ScyllaSettings,

    /// Cache configuration
    pub cache: CacheSettings,

    /// Upper bound for releasing the cache connection on shutdown
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Scylla,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

/// ScyllaDB connection configuration
#[derive(Debug, Clone)]
pub struct ScyllaSettings {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Cache connection and policy configuration
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub url: String,
    /// Key prefix scoping this service's entries
    pub namespace: String,
    /// TTL of cached review lists
    pub ttl: Duration,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub health_check_interval: Duration,
    /// Responses larger than this are served but not cached
    pub max_body_bytes: usize,
}

impl CacheSettings {
    pub const fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            retry_delay: self.retry_delay,
            connect_timeout: self.connect_timeout,
            operation_timeout: self.operation_timeout,
            health_check_interval: self.health_check_interval,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a variable that is set but
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ttl = secs(&lookup, "CACHE_TTL_SECS", 900)?;
        if ttl.is_zero() {
            return Err(invalid("CACHE_TTL_SECS", "0", "must be greater than zero"));
        }
        if ttl.as_secs() > MAX_CACHE_TTL_SECS {
            return Err(invalid(
                "CACHE_TTL_SECS",
                &ttl.as_secs().to_string(),
                &format!("must be at most {MAX_CACHE_TTL_SECS}"),
            ));
        }

        Ok(Self {
            server_addr: parse(&lookup, "SERVER_ADDR", "0.0.0.0:3002")?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            storage: match lookup("STORAGE_BACKEND").as_deref() {
                None | Some("scylla") => StorageBackend::Scylla,
                Some("memory") => StorageBackend::Memory,
                Some(other) => {
                    return Err(invalid("STORAGE_BACKEND", other, "expected scylla or memory"));
                }
            },

            scylla: ScyllaSettings {
                hosts: lookup("SCYLLA_HOSTS")
                    .unwrap_or_else(|| "127.0.0.1:9042".to_string())
                    .split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(String::from)
                    .collect(),
                keyspace: lookup("SCYLLA_KEYSPACE")
                    .unwrap_or_else(|| "review_service".to_string()),
                username: lookup("SCYLLA_USERNAME"),
                password: lookup("SCYLLA_PASSWORD"),
            },

            cache: CacheSettings {
                backend: match lookup("CACHE_BACKEND").as_deref() {
                    None | Some("redis") => CacheBackendKind::Redis,
                    Some("memory") => CacheBackendKind::Memory,
                    Some(other) => {
                        return Err(invalid("CACHE_BACKEND", other, "expected redis or memory"));
                    }
                },
                url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                namespace: lookup("CACHE_NAMESPACE")
                    .unwrap_or_else(|| "review-service".to_string()),
                ttl,
                retry_delay: nonzero_millis(&lookup, "CACHE_RETRY_DELAY_MS", 5_000)?,
                connect_timeout: nonzero_millis(&lookup, "CACHE_CONNECT_TIMEOUT_MS", 3_000)?,
                operation_timeout: nonzero_millis(&lookup, "CACHE_OPERATION_TIMEOUT_MS", 2_000)?,
                health_check_interval: nonzero_millis(
                    &lookup,
                    "CACHE_HEALTH_CHECK_INTERVAL_MS",
                    10_000,
                )?,
                max_body_bytes: parse(&lookup, "CACHE_MAX_BODY_BYTES", "1048576")?,
            },

            shutdown_timeout: millis(&lookup, "SHUTDOWN_TIMEOUT_MS", 5_000)?,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| invalid(var, &value, &err.to_string()))
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse(lookup, var, &default.to_string()).map(Duration::from_millis)
}

fn nonzero_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let duration = millis(lookup, var, default)?;
    if duration.is_zero() {
        return Err(invalid(var, "0", "must be greater than zero"));
    }
    Ok(duration)
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse(lookup, var, &default.to_string()).map(Duration::from_secs)
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = config_with(&[]).unwrap();

        assert_eq!(config.server_addr.port(), 3002);
        assert_eq!(config.storage, StorageBackend::Scylla);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.namespace, "review-service");
        assert_eq!(config.cache.ttl, Duration::from_secs(900));
        assert_eq!(config.cache.retry_delay, Duration::from_secs(5));
        assert_eq!(config.cache.max_body_bytes, 1024 * 1024);
        assert_eq!(config.scylla.hosts, vec!["127.0.0.1:9042".to_string()]);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_with(&[
            ("CACHE_TTL_SECS", "60"),
            ("CACHE_BACKEND", "memory"),
            ("STORAGE_BACKEND", "memory"),
            ("SCYLLA_HOSTS", "a:9042, b:9042"),
            ("CACHE_OPERATION_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.scylla.hosts, vec!["a:9042", "b:9042"]);
        assert_eq!(
            config.cache.connection_config().operation_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config_with(&[("CACHE_TTL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "CACHE_TTL_SECS", .. })
        ));
        assert!(matches!(
            config_with(&[("CACHE_TTL_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "CACHE_TTL_SECS", .. })
        ));
        assert!(matches!(
            config_with(&[("CACHE_BACKEND", "memcached")]),
            Err(ConfigError::Invalid { var: "CACHE_BACKEND", .. })
        ));
        assert!(matches!(
            config_with(&[("CACHE_TTL_SECS", &u64::MAX.to_string())]),
            Err(ConfigError::Invalid { var: "CACHE_TTL_SECS", .. })
        ));
        assert!(matches!(
            config_with(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { var: "SERVER_ADDR", .. })
        ));
    }

    #[test]
    fn zero_cache_periods_are_rejected() {
        for var in [
            "CACHE_RETRY_DELAY_MS",
            "CACHE_CONNECT_TIMEOUT_MS",
            "CACHE_OPERATION_TIMEOUT_MS",
            "CACHE_HEALTH_CHECK_INTERVAL_MS",
        ] {
            match config_with(&[(var, "0")]) {
                Err(ConfigError::Invalid { var: rejected, .. }) => assert_eq!(rejected, var),
                other => panic!("{var}=0 accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn ttl_upper_bound_is_inclusive() {
        let config = config_with(&[("CACHE_TTL_SECS", &MAX_CACHE_TTL_SECS.to_string())]).unwrap();
        assert_eq!(config.cache.ttl.as_secs(), MAX_CACHE_TTL_SECS);
    }
}
