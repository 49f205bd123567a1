//! In-process cache store.
//!
//! Behaves like the Redis backend (per-entry expiry, batch delete that
//! ignores missing keys) without a server. The availability switch makes
//! every connect and command fail the way an unreachable store would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::connection::{CacheBackend, Connector, SharedBackend};
use crate::error::{CacheError, CacheResult};

/// Longest expiry the store honors.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Key-value store held in process memory.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Whether `key` holds an unexpired value.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> CacheResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CacheError::Connection(
                "in-memory cache store unavailable".to_string(),
            ))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.entries();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.ensure_available()?;
        let now = Instant::now();
        let expires_at = now + ttl.min(MAX_TTL);

        let mut entries = self.entries();
        // Expired keys that are never read back are dropped here.
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.entries();

        let deleted = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| entry.expires_at > now)
            .count();
        Ok(deleted as u64)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.ensure_available()
    }
}

/// Hands out the shared [`MemoryStore`] while it is available.
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub const fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> CacheResult<SharedBackend> {
        self.store.ensure_available()?;
        Ok(Arc::clone(&self.store) as SharedBackend)
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }
}
