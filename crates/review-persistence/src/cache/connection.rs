//! # Cache Connection Lifecycle
//!
//! [`ConnectionManager`] owns the single connection to the cache store.
//! It connects on startup, detects drops (failed commands or a failed
//! periodic ping), retries on a fixed delay until closed, and exposes one
//! `is_live()` predicate that every other cache component consults.
//!
//! ```text
//!  Disconnected ──► Connecting ──► Connected
//!        ▲              │              │
//!        │              ▼              │ drop detected
//!        └────────── Failed ◄──────────┘ (via Disconnected)
//! ```
//!
//! State and connection handle live together in one `watch` channel, so a
//! reader can never see `Connected` without a handle or the reverse.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{CacheError, CacheResult};

// =============================================================================
// STATE
// =============================================================================

/// Connection state of the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt failed. Retried exactly like `Disconnected`.
    Failed,
}

impl ConnectionState {
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Diagnostic snapshot of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// When `state` was entered
    pub since: DateTime<Utc>,
    /// Connection attempts since the last successful connect
    pub attempts: u32,
    pub last_error: Option<String>,
}

// =============================================================================
// BACKEND SEAM
// =============================================================================

/// Commands the cache subsystem issues against a connected store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` so that it becomes unreadable `ttl` from now.
    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete `keys` in one batch, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    async fn ping(&self) -> CacheResult<()>;
}

pub type SharedBackend = Arc<dyn CacheBackend>;

/// Opens connections to a cache store.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> CacheResult<SharedBackend>;

    /// Printable store address, without credentials.
    fn endpoint(&self) -> String;
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Timing knobs for the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Delay between a failed attempt (or a detected drop) and the next attempt
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for every get / set / delete / ping
    pub operation_timeout: Duration,
    /// Ping period while connected
    pub health_check_interval: Duration,
}

/// Lower bound applied to `retry_delay` and `health_check_interval`.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

impl ConnectionConfig {
    /// Raise zero or near-zero periods to [`MIN_PERIOD`].
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            retry_delay: self.retry_delay.max(MIN_PERIOD),
            health_check_interval: self.health_check_interval.max(MIN_PERIOD),
            ..self
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            operation_timeout: Duration::from_secs(2),
            health_check_interval: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// CONNECTION MANAGER
// =============================================================================

struct Shared {
    status: ConnectionStatus,
    backend: Option<SharedBackend>,
    /// Bumped on every successful connect so failures reported against an
    /// older connection cannot tear down a newer one.
    generation: u64,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    shared: watch::Sender<Shared>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Owner of the cache store connection. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        let (shared, _) = watch::channel(Shared {
            status: ConnectionStatus {
                state: ConnectionState::Disconnected,
                since: Utc::now(),
                attempts: 0,
                last_error: None,
            },
            backend: None,
            generation: 0,
        });
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                connector,
                config: config.normalized(),
                shared,
                shutdown,
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> String {
        self.inner.connector.endpoint()
    }

    /// Spawn the background task that connects and keeps reconnecting.
    ///
    /// Calling it twice, or after [`close`](Self::close), does nothing.
    pub fn start(&self) {
        if self.is_closed() {
            return;
        }
        let mut supervisor = lock(&self.inner.supervisor);
        if supervisor.is_some() {
            return;
        }
        let manager = self.clone();
        *supervisor = Some(tokio::spawn(async move { manager.supervise().await }));
    }

    pub fn is_live(&self) -> bool {
        self.inner.shared.borrow().status.state.is_live()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.shared.borrow().status.clone()
    }

    /// Wait until the connection status satisfies `predicate`.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&ConnectionStatus) -> bool,
    ) -> ConnectionStatus {
        let mut rx = self.inner.shared.subscribe();
        match rx.wait_for(|shared| predicate(&shared.status)).await {
            Ok(shared) => shared.status.clone(),
            Err(_) => self.status(),
        }
    }

    /// Make a single connection attempt.
    ///
    /// # Errors
    ///
    /// Returns the connector's error, a [`CacheError::Timeout`] when the
    /// attempt exceeds `connect_timeout`, or [`CacheError::Closed`] after
    /// [`close`](Self::close).
    pub async fn connect(&self) -> CacheResult<()> {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        if self.is_live() {
            return Ok(());
        }

        self.transition(ConnectionState::Connecting, None, |shared| {
            shared.status.attempts = shared.status.attempts.saturating_add(1);
            true
        });

        let timeout = self.inner.config.connect_timeout;
        let result = match tokio::time::timeout(timeout, self.inner.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op: "connect",
                timeout_ms: millis(timeout),
            }),
        };

        match result {
            Ok(_) if self.is_closed() => {
                self.transition(ConnectionState::Disconnected, None, |_| true);
                Err(CacheError::Closed)
            }
            Ok(backend) => {
                self.transition(ConnectionState::Connected, None, |shared| {
                    shared.backend = Some(backend);
                    shared.generation += 1;
                    shared.status.attempts = 0;
                    shared.status.last_error = None;
                    true
                });
                Ok(())
            }
            Err(err) => {
                self.transition(ConnectionState::Failed, Some(&err), |shared| {
                    shared.backend = None;
                    shared.status.last_error = Some(err.to_string());
                    true
                });
                Err(err)
            }
        }
    }

    /// # Errors
    ///
    /// [`CacheError::NotConnected`] when not live, otherwise the store's
    /// error or a timeout.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.run("get", |backend| async move { backend.get(key).await })
            .await
    }

    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.run("set", |backend| async move { backend.set_ex(key, value, ttl).await })
            .await
    }

    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        self.run("delete", |backend| async move { backend.delete_many(keys).await })
            .await
    }

    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn ping(&self) -> CacheResult<()> {
        self.run("ping", |backend| async move { backend.ping().await })
            .await
    }

    /// Stop reconnecting and release the connection.
    ///
    /// Idempotent, and safe when no connection was ever made.
    pub async fn close(&self) {
        self.inner.shutdown.send_replace(true);

        let supervisor = lock(&self.inner.supervisor).take();
        if let Some(task) = supervisor {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Cache connection supervisor ended abnormally");
            }
        }

        let released = self.transition(ConnectionState::Disconnected, None, |shared| {
            let had_backend = shared.backend.take().is_some();
            had_backend || shared.status.state != ConnectionState::Disconnected
        });
        if released {
            tracing::info!(endpoint = %self.endpoint(), "Cache connection closed");
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn is_closed(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    fn live_backend(&self) -> CacheResult<(SharedBackend, u64)> {
        let shared = self.inner.shared.borrow();
        match (&shared.backend, shared.status.state) {
            (Some(backend), ConnectionState::Connected) => {
                Ok((Arc::clone(backend), shared.generation))
            }
            _ => Err(CacheError::NotConnected),
        }
    }

    async fn run<T, F>(
        &self,
        op: &'static str,
        command: impl FnOnce(SharedBackend) -> F,
    ) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let (backend, generation) = self.live_backend()?;
        let timeout = self.inner.config.operation_timeout;

        let result = match tokio::time::timeout(timeout, command(backend)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op,
                timeout_ms: millis(timeout),
            }),
        };

        if let Err(err) = &result {
            if err.is_connection_loss() {
                self.mark_disconnected(generation, err);
            }
        }
        result
    }

    fn mark_disconnected(&self, generation: u64, err: &CacheError) {
        self.transition(ConnectionState::Disconnected, Some(err), |shared| {
            if shared.generation != generation
                || shared.status.state != ConnectionState::Connected
            {
                return false;
            }
            shared.backend = None;
            shared.status.last_error = Some(err.to_string());
            true
        });
    }

    /// Apply `update` and, if it reports a change, move to `to` and log it.
    fn transition(
        &self,
        to: ConnectionState,
        error: Option<&CacheError>,
        update: impl FnOnce(&mut Shared) -> bool,
    ) -> bool {
        let mut from = None;
        let changed = self.inner.shared.send_if_modified(|shared| {
            let previous = shared.status.state;
            if !update(shared) {
                return false;
            }
            shared.status.state = to;
            shared.status.since = Utc::now();
            from = Some(previous);
            true
        });

        if let Some(from) = from {
            let endpoint = self.endpoint();
            match error {
                Some(err) => tracing::warn!(
                    ?from,
                    ?to,
                    %endpoint,
                    error = %err,
                    "Cache connection state changed"
                ),
                None => tracing::info!(?from, ?to, %endpoint, "Cache connection state changed"),
            }
        }
        changed
    }

    async fn supervise(self) {
        let mut shutdown = self.inner.shutdown.subscribe();
        let retry_delay = self.inner.config.retry_delay;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let connected = tokio::select! {
                result = self.connect() => result.is_ok(),
                _ = shutdown.changed() => break,
            };
            if connected {
                self.hold(&mut shutdown).await;
            }
            if *shutdown.borrow() {
                break;
            }

            tracing::info!(
                retry_in_ms = millis(retry_delay),
                endpoint = %self.endpoint(),
                "Scheduling cache reconnect"
            );
            tokio::select! {
                () = tokio::time::sleep(retry_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::debug!("Cache connection supervisor stopped");
    }

    /// Watch a live connection until it drops or shutdown is requested.
    async fn hold(&self, shutdown: &mut watch::Receiver<bool>) {
        let mut state = self.inner.shared.subscribe();
        let generation = state.borrow_and_update().generation;

        let mut ticker = tokio::time::interval(self.inner.config.health_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                () = async {
                    let _ = state.wait_for(|shared| !shared.status.state.is_live()).await;
                } => return,
                _ = ticker.tick() => {
                    if let Err(err) = self.ping().await {
                        // Any failed ping counts as a drop, not only I/O errors.
                        self.mark_disconnected(generation, &err);
                        return;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
