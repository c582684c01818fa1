//! In-memory content store seeded from a TOML file.
//!
//! Every mutation method applies its change, releases the state lock and then
//! publishes the matching events on the [`MutationBus`], so cache clears have
//! happened by the time the method returns.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use comrak::{Options, markdown_to_html};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{ContentStore, EntityFilter, RepoError};
use crate::cache::{EntityChange, EventKind, MutationBus, SiteOption, rw_read, rw_write};
use crate::config::MirrorSettings;
use crate::domain::entities::{ContentEntity, SiteOptions, TaxonomyTerm};
use crate::domain::types::{EligibleTypes, PublishStatus, Taxonomy};
use crate::infra::error::InfraError;

const SOURCE: &str = "infra::content";

/// A change to one site option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOptionUpdate {
    Title(String),
    Description(String),
    CustomSummary(Option<String>),
    EligibleTypes(EligibleTypes),
}

impl SiteOptionUpdate {
    fn option(&self) -> SiteOption {
        match self {
            SiteOptionUpdate::Title(_) => SiteOption::SiteTitle,
            SiteOptionUpdate::Description(_) => SiteOption::SiteDescription,
            SiteOptionUpdate::CustomSummary(_) => SiteOption::CustomSummary,
            SiteOptionUpdate::EligibleTypes(_) => SiteOption::EligibleTypes,
        }
    }
}

struct ContentState {
    entities: HashMap<Uuid, ContentEntity>,
    terms: HashMap<Uuid, TaxonomyTerm>,
    /// Latest autosaved revision per entity. Never served.
    autosaves: HashMap<Uuid, ContentEntity>,
    options: SiteOptions,
}

impl ContentState {
    fn slug_taken(&self, slug: &str, except: Uuid) -> bool {
        self.entities
            .values()
            .any(|entity| entity.slug == slug && entity.id != except)
    }

    fn entity_mut(&mut self, id: Uuid) -> Result<&mut ContentEntity, RepoError> {
        self.entities.get_mut(&id).ok_or(RepoError::NotFound)
    }
}

pub struct MemoryContentStore {
    state: RwLock<ContentState>,
    bus: Arc<MutationBus>,
}

impl MemoryContentStore {
    pub fn new(options: SiteOptions, bus: Arc<MutationBus>) -> Self {
        Self {
            state: RwLock::new(ContentState {
                entities: HashMap::new(),
                terms: HashMap::new(),
                autosaves: HashMap::new(),
                options,
            }),
            bus,
        }
    }

    pub async fn load_seed(
        path: &Path,
        mirror: &MirrorSettings,
        bus: Arc<MutationBus>,
    ) -> Result<Self, InfraError> {
        let source = tokio::fs::read_to_string(path).await?;
        let store = Self::from_seed_str(&source, mirror, bus)?;
        info!(
            path = %path.display(),
            entities = store.entity_count(),
            "Content seed loaded"
        );
        Ok(store)
    }

    /// Build a store from seed text. Seeding publishes no events.
    pub fn from_seed_str(
        source: &str,
        mirror: &MirrorSettings,
        bus: Arc<MutationBus>,
    ) -> Result<Self, InfraError> {
        let seed: SeedFile =
            toml::from_str(source).map_err(|err| InfraError::seed(err.to_string()))?;

        let options = SiteOptions {
            title: seed.site.title,
            description: seed.site.description,
            custom_summary: mirror.custom_summary.clone(),
            eligible_types: mirror.eligible_types.clone(),
        };
        let store = Self::new(options, bus);

        {
            let mut state = rw_write(&store.state, SOURCE, "seed");
            let mut term_ids: HashMap<(Taxonomy, String), Uuid> = HashMap::new();

            for term in seed.terms {
                let taxonomy = term
                    .taxonomy
                    .parse::<Taxonomy>()
                    .map_err(|err| InfraError::seed(err.to_string()))?;
                let id = term.id.unwrap_or_else(Uuid::new_v4);
                term_ids.insert((taxonomy, term.slug.clone()), id);
                state.terms.insert(
                    id,
                    TaxonomyTerm {
                        id,
                        taxonomy,
                        slug: term.slug,
                        name: term.name,
                        description: term.description,
                    },
                );
            }

            for entity in seed.entities {
                let entity = entity.into_entity(&term_ids)?;
                if state.slug_taken(&entity.slug, entity.id) {
                    return Err(InfraError::seed(format!(
                        "duplicate slug `{}`",
                        entity.slug
                    )));
                }
                state.entities.insert(entity.id, entity);
            }
        }

        Ok(store)
    }

    pub fn entity_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "entity_count").entities.len()
    }

    /// Add a term. Terms carry no invalidation signal of their own.
    pub fn insert_term(&self, term: TaxonomyTerm) {
        rw_write(&self.state, SOURCE, "insert_term")
            .terms
            .insert(term.id, term);
    }

    pub fn insert(&self, entity: ContentEntity) -> Result<(), RepoError> {
        let entity_id = entity.id;
        {
            let mut state = rw_write(&self.state, SOURCE, "insert");
            if state.entities.contains_key(&entity_id) {
                return Err(RepoError::invalid_input(format!(
                    "entity `{entity_id}` already exists"
                )));
            }
            if state.slug_taken(&entity.slug, entity_id) {
                return Err(RepoError::invalid_input(format!(
                    "slug `{}` is already in use",
                    entity.slug
                )));
            }
            state.entities.insert(entity_id, entity);
        }

        self.publish(entity_id, vec![EntityChange::Created]);
        Ok(())
    }

    /// Replace an entity. Emits `Updated` plus slug and status transitions.
    pub fn update(&self, entity: ContentEntity) -> Result<(), RepoError> {
        let entity_id = entity.id;
        let mut changes = vec![EntityChange::Updated];
        {
            let mut state = rw_write(&self.state, SOURCE, "update");
            if state.slug_taken(&entity.slug, entity_id) {
                return Err(RepoError::invalid_input(format!(
                    "slug `{}` is already in use",
                    entity.slug
                )));
            }
            let current = state.entity_mut(entity_id)?;
            if current.slug != entity.slug {
                changes.push(EntityChange::SlugChanged {
                    old: current.slug.clone(),
                    new: entity.slug.clone(),
                });
            }
            if current.status != entity.status {
                changes.push(EntityChange::StatusChanged {
                    old: current.status,
                    new: entity.status,
                });
            }
            *current = entity;
            state.autosaves.remove(&entity_id);
        }

        self.publish(entity_id, changes);
        Ok(())
    }

    /// Record an in-progress revision. The served entity is unchanged.
    pub fn autosave(&self, revision: ContentEntity) -> Result<(), RepoError> {
        let entity_id = revision.id;
        {
            let mut state = rw_write(&self.state, SOURCE, "autosave");
            if !state.entities.contains_key(&entity_id) {
                return Err(RepoError::NotFound);
            }
            state.autosaves.insert(entity_id, revision);
        }

        self.bus.publish_autosave(EventKind::Entity {
            entity_id,
            change: EntityChange::Updated,
        });
        Ok(())
    }

    pub fn autosaved_revision(&self, entity_id: Uuid) -> Option<ContentEntity> {
        rw_read(&self.state, SOURCE, "autosaved_revision")
            .autosaves
            .get(&entity_id)
            .cloned()
    }

    pub fn set_status(&self, entity_id: Uuid, status: PublishStatus) -> Result<(), RepoError> {
        let old = {
            let mut state = rw_write(&self.state, SOURCE, "set_status");
            let entity = state.entity_mut(entity_id)?;
            std::mem::replace(&mut entity.status, status)
        };

        if old != status {
            self.publish(
                entity_id,
                vec![EntityChange::StatusChanged { old, new: status }],
            );
        }
        Ok(())
    }

    pub fn trash(&self, entity_id: Uuid) -> Result<(), RepoError> {
        {
            let mut state = rw_write(&self.state, SOURCE, "trash");
            state.entity_mut(entity_id)?.status = PublishStatus::Trashed;
        }

        self.publish(entity_id, vec![EntityChange::Trashed]);
        Ok(())
    }

    pub fn delete(&self, entity_id: Uuid) -> Result<(), RepoError> {
        {
            let mut state = rw_write(&self.state, SOURCE, "delete");
            state
                .entities
                .remove(&entity_id)
                .ok_or(RepoError::NotFound)?;
            state.autosaves.remove(&entity_id);
        }

        self.publish(entity_id, vec![EntityChange::Deleted]);
        Ok(())
    }

    pub fn set_meta(
        &self,
        entity_id: Uuid,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RepoError> {
        let key = key.into();
        {
            let mut state = rw_write(&self.state, SOURCE, "set_meta");
            state
                .entity_mut(entity_id)?
                .meta
                .insert(key.clone(), value.into());
        }

        self.publish(entity_id, vec![EntityChange::MetaChanged { key }]);
        Ok(())
    }

    pub fn remove_meta(&self, entity_id: Uuid, key: &str) -> Result<(), RepoError> {
        let removed = {
            let mut state = rw_write(&self.state, SOURCE, "remove_meta");
            state.entity_mut(entity_id)?.meta.remove(key).is_some()
        };

        if removed {
            self.publish(
                entity_id,
                vec![EntityChange::MetaChanged {
                    key: key.to_string(),
                }],
            );
        }
        Ok(())
    }

    pub fn update_site_option(&self, update: SiteOptionUpdate) {
        let option = update.option();
        {
            let mut state = rw_write(&self.state, SOURCE, "update_site_option");
            let options = &mut state.options;
            match update {
                SiteOptionUpdate::Title(title) => options.title = title,
                SiteOptionUpdate::Description(description) => options.description = description,
                SiteOptionUpdate::CustomSummary(summary) => options.custom_summary = summary,
                SiteOptionUpdate::EligibleTypes(types) => options.eligible_types = types,
            }
        }

        self.bus.publish(EventKind::OptionUpdated(option));
    }

    fn publish(&self, entity_id: Uuid, changes: Vec<EntityChange>) {
        let kinds = changes
            .into_iter()
            .map(|change| EventKind::Entity { entity_id, change })
            .collect();
        self.bus.publish_batch(kinds, false);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_entity(&self, id: Uuid) -> Result<Option<ContentEntity>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "get_entity")
            .entities
            .get(&id)
            .cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentEntity>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_by_slug")
            .entities
            .values()
            .find(|entity| entity.slug == slug)
            .cloned())
    }

    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<ContentEntity>, RepoError> {
        let mut entities: Vec<ContentEntity> = rw_read(&self.state, SOURCE, "list_entities")
            .entities
            .values()
            .filter(|entity| filter.matches(entity))
            .cloned()
            .collect();
        entities.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        Ok(entities)
    }

    async fn list_taxonomy_terms(
        &self,
        taxonomy: Taxonomy,
        non_empty_only: bool,
    ) -> Result<Vec<TaxonomyTerm>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_taxonomy_terms");
        let mut terms: Vec<TaxonomyTerm> = state
            .terms
            .values()
            .filter(|term| term.taxonomy == taxonomy)
            .filter(|term| {
                !non_empty_only
                    || state.entities.values().any(|entity| {
                        entity.status.is_published() && entity.terms.contains(&term.id)
                    })
            })
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        Ok(terms)
    }

    async fn find_term(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TaxonomyTerm>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_term")
            .terms
            .values()
            .find(|term| term.taxonomy == taxonomy && term.slug == slug)
            .cloned())
    }

    async fn site_options(&self) -> Result<SiteOptions, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "site_options").options.clone())
    }
}

// ============================================================================
// Seed file
// ============================================================================

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    site: SeedSite,
    #[serde(default)]
    terms: Vec<SeedTerm>,
    #[serde(default)]
    entities: Vec<SeedEntity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedSite {
    title: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct SeedTerm {
    id: Option<Uuid>,
    taxonomy: String,
    slug: String,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeedEntity {
    id: Option<Uuid>,
    slug: String,
    title: String,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    published_at: Option<OffsetDateTime>,
    #[serde(default)]
    excerpt: String,
    /// Markdown source, rendered to HTML at load time.
    #[serde(default)]
    body: String,
    /// `<taxonomy>/<term slug>` references.
    #[serde(default)]
    terms: Vec<String>,
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

fn default_content_type() -> String {
    "post".to_string()
}

fn default_status() -> String {
    PublishStatus::Published.as_str().to_string()
}

impl SeedEntity {
    fn into_entity(
        self,
        term_ids: &HashMap<(Taxonomy, String), Uuid>,
    ) -> Result<ContentEntity, InfraError> {
        let status = self
            .status
            .parse::<PublishStatus>()
            .map_err(|err| InfraError::seed(err.to_string()))?;

        let terms = self
            .terms
            .iter()
            .map(|reference| resolve_term(reference, term_ids))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ContentEntity {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            content_type: self.content_type,
            slug: self.slug,
            title: self.title,
            body_html: markdown_to_html(&self.body, &Options::default()),
            excerpt: self.excerpt,
            status,
            published_at: self.published_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            terms,
            meta: self.meta,
        })
    }
}

fn resolve_term(
    reference: &str,
    term_ids: &HashMap<(Taxonomy, String), Uuid>,
) -> Result<Uuid, InfraError> {
    let (taxonomy, slug) = reference
        .split_once('/')
        .ok_or_else(|| InfraError::seed(format!("term reference `{reference}` needs a taxonomy")))?;
    let taxonomy = taxonomy
        .parse::<Taxonomy>()
        .map_err(|err| InfraError::seed(err.to_string()))?;
    term_ids
        .get(&(taxonomy, slug.to_string()))
        .copied()
        .ok_or_else(|| InfraError::seed(format!("unknown term `{reference}`")))
}
