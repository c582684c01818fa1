//! Document cache service handed to every builder.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::CacheStore;

/// Binds a [`CacheStore`] to the configured group names and ttl.
///
/// Builders never see group names or ttl values; they read and write
/// [`CacheKey`]s. Cloning is cheap and shares the underlying store.
#[derive(Clone)]
pub struct DocumentCache {
    store: Arc<dyn CacheStore>,
    group: String,
    taxonomy_group: String,
    ttl: Duration,
    enabled: bool,
}

impl DocumentCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            group: config.group.clone(),
            taxonomy_group: config.taxonomy_group(),
            ttl: config.ttl(),
            enabled: config.enabled,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn taxonomy_group(&self) -> &str {
        &self.taxonomy_group
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn group_for(&self, key: &CacheKey) -> &str {
        if key.is_taxonomy() {
            &self.taxonomy_group
        } else {
            &self.group
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get(self.group_for(key), &key.render());
        debug!(
            cache_key = %key,
            kind = key.kind(),
            hit = value.is_some(),
            "Document cache lookup"
        );
        value
    }

    /// Store a freshly built document. A rejected write is logged; the caller
    /// still serves the document it built.
    pub fn put(&self, key: &CacheKey, value: &str) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self
            .store
            .set(self.group_for(key), &key.render(), value.to_string(), self.ttl)
        {
            warn!(
                cache_key = %key,
                kind = key.kind(),
                error = %err,
                "Document not cached"
            );
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.store.delete(self.group_for(key), &key.render());
    }

    pub fn flush_taxonomy(&self) {
        self.store.flush_group(&self.taxonomy_group);
    }

    /// Clear both groups.
    pub fn flush_all(&self) {
        self.store.flush_group(&self.group);
        self.store.flush_group(&self.taxonomy_group);
    }
}
