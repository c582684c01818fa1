//! Invalidation coordinator.
//!
//! Subscribes to the mutation bus and executes one [`InvalidationPlan`] per
//! published batch.

use std::time::Instant;

use metrics::histogram;
use tracing::info;
use uuid::Uuid;

use super::document::DocumentCache;
use super::events::{MutationEvent, MutationHandler};
use super::keys::CacheKey;
use super::planner::InvalidationPlan;

pub(crate) const METRIC_INVALIDATION_MS: &str = "mdmirror_invalidation_ms";

pub struct InvalidationCoordinator {
    cache: DocumentCache,
}

impl InvalidationCoordinator {
    pub fn new(cache: DocumentCache) -> Self {
        Self { cache }
    }

    /// Execute a plan. Returns true if anything was cleared.
    pub fn execute(&self, plan: &InvalidationPlan) -> bool {
        if plan.is_empty() {
            return false;
        }
        let started_at = Instant::now();

        if plan.flush_all {
            self.cache.flush_all();
        } else {
            for entity_id in &plan.entity_documents {
                self.cache.invalidate(&CacheKey::EntityMarkdown(*entity_id));
            }
            if plan.clear_index {
                self.clear_index_and_derived();
            }
        }

        histogram!(
            METRIC_INVALIDATION_MS,
            "mode" => if plan.flush_all { "flush" } else { "targeted" }
        )
        .record(started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    /// The context documents and archives are derived from the index and are
    /// cleared with it.
    fn clear_index_and_derived(&self) {
        self.cache.invalidate(&CacheKey::IndexDocument);
        self.cache.invalidate(&CacheKey::BasicContext);
        self.cache.invalidate(&CacheKey::FullContext);
        self.cache.flush_taxonomy();
    }
}

impl MutationHandler for InvalidationCoordinator {
    fn on_events(&self, events: &[MutationEvent]) {
        let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count = events.len(),
            event_ids = ?event_ids,
            plan = %plan,
            "Cache invalidation starting"
        );

        let cleared = self.execute(&plan);

        info!(
            event_count = events.len(),
            cleared,
            entity_documents = plan.entity_documents.len(),
            "Cache invalidation complete"
        );
    }
}
