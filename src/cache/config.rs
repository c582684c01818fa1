//! Cache configuration.
//!
//! Built from the validated `[cache]` settings; see [`crate::config::CacheSettings`].

use std::num::NonZeroUsize;
use std::time::Duration;

pub(crate) const DEFAULT_GROUP: &str = "md_mirror";
pub(crate) const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;
pub(crate) const DEFAULT_CAPACITY: usize = 1024;
pub(crate) const DEFAULT_MAX_ENTRY_BYTES: usize = 8 * 1024 * 1024;

/// Runtime cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve every read as a miss when false.
    pub enabled: bool,
    /// Group holding entity documents, the index and the context documents.
    pub group: String,
    /// Lifetime of an entry in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of entries before LRU eviction.
    pub capacity: usize,
    /// Largest document accepted by the store.
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group: DEFAULT_GROUP.to_string(),
            ttl_seconds: DEFAULT_TTL_SECS,
            capacity: DEFAULT_CAPACITY,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            group: settings.group.clone(),
            ttl_seconds: settings.ttl.as_secs(),
            capacity: settings.capacity.get(),
            max_entry_bytes: settings.max_entry_bytes.get(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Group holding taxonomy archive documents.
    pub fn taxonomy_group(&self) -> String {
        format!("{}_taxonomy", self.group)
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
