#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use mdmirror::application::convert::{ConvertError, Converter};
use mdmirror::application::repos::{ContentStore, EntityFilter, RepoError};
use mdmirror::application::{MirrorConfig, MirrorServices};
use mdmirror::cache::{CacheConfig, DocumentCache, ManualClock, MemoryCacheStore, MutationBus};
use mdmirror::domain::entities::{ContentEntity, SiteOptions, TaxonomyTerm};
use mdmirror::domain::types::{EligibleTypes, PublishStatus, Taxonomy};
use mdmirror::infra::content::MemoryContentStore;
use mdmirror::infra::convert::HtmlConverter;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const SITE_URL: &str = "https://site";

/// Counts index builds through `list_entities` and entity fetches.
pub struct CountingStore {
    inner: Arc<MemoryContentStore>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryContentStore>) -> Self {
        Self {
            inner,
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for CountingStore {
    async fn get_entity(&self, id: Uuid) -> Result<Option<ContentEntity>, RepoError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_entity(id).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentEntity>, RepoError> {
        self.inner.find_by_slug(slug).await
    }

    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<ContentEntity>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_entities(filter).await
    }

    async fn list_taxonomy_terms(
        &self,
        taxonomy: Taxonomy,
        non_empty_only: bool,
    ) -> Result<Vec<TaxonomyTerm>, RepoError> {
        self.inner.list_taxonomy_terms(taxonomy, non_empty_only).await
    }

    async fn find_term(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TaxonomyTerm>, RepoError> {
        self.inner.find_term(taxonomy, slug).await
    }

    async fn site_options(&self) -> Result<SiteOptions, RepoError> {
        self.inner.site_options().await
    }
}

/// Counts conversions; bodies containing `FAIL` fail to convert.
#[derive(Default)]
pub struct CountingConverter {
    inner: HtmlConverter,
    calls: AtomicUsize,
}

impl CountingConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for CountingConverter {
    fn convert(&self, html: &str) -> Result<String, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if html.contains("FAIL") {
            return Err(ConvertError::rewrite("refusing test body"));
        }
        self.inner.convert(html)
    }
}

pub fn site_options() -> SiteOptions {
    SiteOptions {
        title: "Example Site".to_string(),
        description: "A tagline".to_string(),
        custom_summary: Some("Test summary".to_string()),
        eligible_types: EligibleTypes::default(),
    }
}

pub struct Fixture {
    pub bus: Arc<MutationBus>,
    pub store: Arc<MemoryContentStore>,
    pub counting: Arc<CountingStore>,
    pub converter: Arc<CountingConverter>,
    pub clock: Arc<ManualClock>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub services: MirrorServices,
    day: AtomicI64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(MirrorConfig::new(SITE_URL), CacheConfig::default())
    }

    pub fn with_mirror(config: MirrorConfig) -> Self {
        Self::with_config(config, CacheConfig::default())
    }

    pub fn with_config(config: MirrorConfig, cache_config: CacheConfig) -> Self {
        let bus = Arc::new(MutationBus::new());
        let store = Arc::new(MemoryContentStore::new(site_options(), bus.clone()));
        let counting = Arc::new(CountingStore::new(store.clone()));
        let converter = Arc::new(CountingConverter::default());
        let clock = Arc::new(ManualClock::new());
        let cache_store = Arc::new(MemoryCacheStore::with_clock(&cache_config, clock.clone()));
        let cache = DocumentCache::new(cache_store.clone(), &cache_config);

        let services = MirrorServices::new(config, counting.clone(), converter.clone(), cache);
        services.subscribe_invalidation(&bus);

        Self {
            bus,
            store,
            counting,
            converter,
            clock,
            cache_store,
            services,
            day: AtomicI64::new(0),
        }
    }

    /// Insert a published post. Later posts are newer.
    pub fn post(&self, slug: &str, title: &str, body_html: &str) -> Uuid {
        self.insert(entity(slug, title, body_html, self.next_date()))
    }

    pub fn insert(&self, entity: ContentEntity) -> Uuid {
        let id = entity.id;
        self.store.insert(entity).expect("insert entity");
        id
    }

    pub fn term(&self, taxonomy: Taxonomy, slug: &str, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_term(TaxonomyTerm {
            id,
            taxonomy,
            slug: slug.to_string(),
            name: name.to_string(),
            description: None,
        });
        id
    }

    pub fn next_date(&self) -> OffsetDateTime {
        let day = self.day.fetch_add(1, Ordering::SeqCst);
        OffsetDateTime::UNIX_EPOCH + Duration::days(day + 1)
    }
}

pub fn entity(slug: &str, title: &str, body_html: &str, published_at: OffsetDateTime) -> ContentEntity {
    ContentEntity {
        id: Uuid::new_v4(),
        content_type: "post".to_string(),
        slug: slug.to_string(),
        title: title.to_string(),
        body_html: body_html.to_string(),
        excerpt: String::new(),
        status: PublishStatus::Published,
        published_at,
        terms: Vec::new(),
        meta: BTreeMap::new(),
    }
}

pub fn link(slug: &str, text: &str) -> String {
    format!(r#"<p>See <a href="{SITE_URL}/{slug}.md">{text}</a></p>"#)
}
