//! Cache storage.
//!
//! `CacheStore` is the group-scoped key/value contract every document cache
//! goes through. `MemoryCacheStore` keeps entries in one LRU bounded by entry
//! count, evaluates ttl against an injected [`Clock`], and drops entries that
//! exceed the configured size limit.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "mdmirror_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "mdmirror_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "mdmirror_cache_evict_total";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("entry `{group}/{key}` is {size} bytes, above the {limit} byte limit")]
    EntryTooLarge {
        group: String,
        key: String,
        size: usize,
        limit: usize,
    },
}

/// Group-scoped key/value store with per-entry ttl.
///
/// All operations are idempotent; deleting a missing key is a no-op.
pub trait CacheStore: Send + Sync {
    fn get(&self, group: &str, key: &str) -> Option<String>;
    fn set(&self, group: &str, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    fn delete(&self, group: &str, key: &str);
    fn flush_group(&self, group: &str);
}

// ============================================================================
// Clock
// ============================================================================

/// Time source used for ttl evaluation.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *mutex_lock(&self.offset, SOURCE, "manual_clock.advance") += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *mutex_lock(&self.offset, SOURCE, "manual_clock.now")
    }
}

// ============================================================================
// Memory store
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

type EntryKey = (String, String);

/// In-process cache store shared by every component of one mirror.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<EntryKey, CacheEntry>>,
    max_entry_bytes: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            max_entry_bytes: config.max_entry_bytes,
            clock,
        }
    }

    /// Number of entries, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists, without touching LRU order or metrics.
    pub fn contains(&self, group: &str, key: &str) -> bool {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "contains")
            .peek(&(group.to_string(), key.to_string()))
            .is_some_and(|entry| !entry.is_expired(now))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, group: &str, key: &str) -> Option<String> {
        let now = self.clock.now();
        let entry_key = (group.to_string(), key.to_string());
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let expired = match entries.get(&entry_key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT, "group" => group.to_string()).increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&entry_key);
            debug!(group, key, "Cache entry expired");
        }
        counter!(METRIC_CACHE_MISS, "group" => group.to_string()).increment(1);
        None
    }

    fn set(&self, group: &str, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if value.len() > self.max_entry_bytes {
            return Err(CacheError::EntryTooLarge {
                group: group.to_string(),
                key: key.to_string(),
                size: value.len(),
                limit: self.max_entry_bytes,
            });
        }

        let entry_key = (group.to_string(), key.to_string());
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
            ttl,
        };

        let displaced = rw_write(&self.entries, SOURCE, "set").push(entry_key.clone(), entry);
        if let Some((evicted, _)) = displaced
            && evicted != entry_key
        {
            counter!(METRIC_CACHE_EVICT, "group" => evicted.0.clone()).increment(1);
            debug!(group = %evicted.0, key = %evicted.1, "Cache entry evicted");
        }
        Ok(())
    }

    fn delete(&self, group: &str, key: &str) {
        rw_write(&self.entries, SOURCE, "delete").pop(&(group.to_string(), key.to_string()));
    }

    fn flush_group(&self, group: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "flush_group");
        let keys: Vec<EntryKey> = entries
            .iter()
            .filter(|((entry_group, _), _)| entry_group == group)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            entries.pop(&key);
        }
    }
}
