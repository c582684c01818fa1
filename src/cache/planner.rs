//! Invalidation plan generation.
//!
//! Merges a batch of mutation events into one deduplicated set of clears.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::domain::entities::is_watched_meta_key;

use super::events::{EntityChange, EventKind, MutationEvent, SiteOption};

/// Clears to execute for one batch.
///
/// `clear_index` covers the index and every document derived from it: the
/// two context documents and the taxonomy archives.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub entity_documents: HashSet<Uuid>,
    pub clear_index: bool,
    pub flush_all: bool,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ entity_documents: {}, clear_index: {}, flush_all: {} }}",
            self.entity_documents.len(),
            self.clear_index,
            self.flush_all,
        )
    }
}

impl InvalidationPlan {
    /// Merge events into a plan.
    ///
    /// - Deduplicates by event ID
    /// - Skips autosave events
    /// - Ignores the entity's content type; an ineligible entity is cleared too
    pub fn from_events(events: &[MutationEvent]) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events {
            if event.autosave || !seen_ids.insert(event.id) {
                continue;
            }

            match &event.kind {
                EventKind::Entity { entity_id, change } => {
                    plan.apply_entity_change(*entity_id, change);
                }
                EventKind::OptionUpdated(SiteOption::EligibleTypes) => {
                    plan.flush_all = true;
                }
                EventKind::OptionUpdated(
                    SiteOption::SiteTitle | SiteOption::SiteDescription | SiteOption::CustomSummary,
                ) => {
                    plan.clear_index = true;
                }
            }
        }

        plan
    }

    fn apply_entity_change(&mut self, entity_id: Uuid, change: &EntityChange) {
        match change {
            EntityChange::Created
            | EntityChange::Updated
            | EntityChange::Deleted
            | EntityChange::Trashed => {
                self.entity_documents.insert(entity_id);
                self.clear_index = true;
            }
            EntityChange::StatusChanged { old, new } => {
                if old.is_published() || new.is_published() {
                    self.clear_index = true;
                }
                if new.is_published() {
                    self.entity_documents.insert(entity_id);
                }
            }
            EntityChange::SlugChanged { .. } => {
                self.clear_index = true;
            }
            EntityChange::MetaChanged { key } => {
                if is_watched_meta_key(key) {
                    self.entity_documents.insert(entity_id);
                    self.clear_index = true;
                }
            }
        }
    }

    /// Check if the plan has any actions to execute.
    pub fn is_empty(&self) -> bool {
        self.entity_documents.is_empty() && !self.clear_index && !self.flush_all
    }
}
