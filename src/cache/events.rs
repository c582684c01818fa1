//! Content mutation events.
//!
//! The content store adapter owns a [`MutationBus`] and publishes one batch of
//! events per mutation. Subscribers run synchronously inside `publish`, so a
//! write returns only after every cache clear it implies has happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::types::PublishStatus;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Unique identifier for deduplication (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
    /// Transient save of an in-progress edit. Never invalidates.
    pub autosave: bool,
}

impl MutationEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
            autosave: false,
        }
    }

    pub fn autosave(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            autosave: true,
            ..Self::new(kind, epoch)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Entity {
        entity_id: Uuid,
        change: EntityChange,
    },
    OptionUpdated(SiteOption),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityChange {
    Created,
    Updated,
    Deleted,
    Trashed,
    StatusChanged {
        old: PublishStatus,
        new: PublishStatus,
    },
    SlugChanged {
        old: String,
        new: String,
    },
    /// A meta key was added, updated or removed.
    MetaChanged {
        key: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteOption {
    SiteTitle,
    SiteDescription,
    CustomSummary,
    EligibleTypes,
}

/// Receives every published batch.
pub trait MutationHandler: Send + Sync {
    fn on_events(&self, events: &[MutationEvent]);
}

/// Typed subscription point for content mutations.
pub struct MutationBus {
    handlers: RwLock<Vec<Arc<dyn MutationHandler>>>,
    epoch_counter: AtomicU64,
}

impl MutationBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, handler: Arc<dyn MutationHandler>) {
        rw_write(&self.handlers, SOURCE, "subscribe").push(handler);
    }

    pub fn subscriber_count(&self) -> usize {
        rw_read(&self.handlers, SOURCE, "subscriber_count").len()
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        self.publish_batch(vec![kind], false);
    }

    pub fn publish_autosave(&self, kind: EventKind) {
        self.publish_batch(vec![kind], true);
    }

    /// Publish the events produced by one mutation and run every handler.
    pub fn publish_batch(&self, kinds: Vec<EventKind>, autosave: bool) {
        if kinds.is_empty() {
            return;
        }

        let events: Vec<MutationEvent> = kinds
            .into_iter()
            .map(|kind| {
                let epoch = self.next_epoch();
                if autosave {
                    MutationEvent::autosave(kind, epoch)
                } else {
                    MutationEvent::new(kind, epoch)
                }
            })
            .collect();

        for event in &events {
            info!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = ?event.kind,
                autosave = event.autosave,
                "Mutation event published"
            );
        }

        let handlers = rw_read(&self.handlers, SOURCE, "publish").clone();
        for handler in handlers {
            handler.on_events(&events);
        }
    }
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new()
    }
}
