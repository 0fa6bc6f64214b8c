//! In-memory key/value cache with per-entry TTL.
//!
//! Built once at startup and handed to whatever needs it; nothing in the
//! odds or settlement code reaches for a global.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    expires_at: DateTime<Utc>,
}

/// Cloneable handle; clones share the same entries.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    inner: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    /// Lookup as of `now`. Expired entries read as absent.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entries = self.read();
        let entry = entries.get(key)?;
        if entry.expires_at <= now {
            debug!(key, "Cache entry expired");
            return None;
        }
        Some(entry.data.clone())
    }

    pub fn set(&self, key: &str, data: V) {
        self.set_at(key, data, self.ttl, Utc::now());
    }

    pub fn set_with_ttl(&self, key: &str, data: V, ttl: Duration) {
        self.set_at(key, data, ttl, Utc::now());
    }

    pub fn set_at(&self, key: &str, data: V, ttl: Duration, now: DateTime<Utc>) {
        self.write().insert(
            key.to_string(),
            CacheEntry {
                data,
                expires_at: now + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
