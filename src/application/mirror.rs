//! Immutable mirror configuration and the wired service bundle.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};

use crate::application::context::ContextService;
use crate::application::convert::Converter;
use crate::application::index::IndexService;
use crate::application::markdown::MarkdownService;
use crate::application::repos::ContentStore;
use crate::application::taxonomy::TaxonomyArchiveService;
use crate::cache::{DocumentCache, InvalidationCoordinator, MutationBus};
use crate::config::{FullContextSettings, IncludeSettings, MirrorSettings};

pub(crate) const METRIC_DOCUMENT_BUILD_MS: &str = "mdmirror_document_build_ms";
pub(crate) const METRIC_DOCUMENT_BUILD_TOTAL: &str = "mdmirror_document_build_total";

/// Record one completed document build.
pub(crate) fn record_build(document: &'static str, started_at: Instant) {
    counter!(METRIC_DOCUMENT_BUILD_TOTAL, "document" => document).increment(1);
    histogram!(METRIC_DOCUMENT_BUILD_MS, "document" => document)
        .record(started_at.elapsed().as_secs_f64() * 1000.0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Site origin without a trailing slash.
    pub site_url: String,
    pub include: IncludeSettings,
    pub include_taxonomies: bool,
    pub full_context: FullContextSettings,
}

impl MirrorConfig {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url: String = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            include: IncludeSettings::default(),
            include_taxonomies: true,
            full_context: FullContextSettings::default(),
        }
    }

    pub fn mirror_url(&self, slug: &str) -> String {
        format!("{}/{slug}.md", self.site_url)
    }

    /// Slug of a mirror URL on this site. Nested paths are not entity mirrors.
    pub fn slug_from_mirror_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let slug = url
            .strip_prefix(self.site_url.as_str())?
            .strip_prefix('/')?
            .strip_suffix(".md")?;
        (!slug.is_empty() && !slug.contains('/')).then_some(slug)
    }
}

impl From<&MirrorSettings> for MirrorConfig {
    fn from(settings: &MirrorSettings) -> Self {
        Self {
            site_url: settings.site_url.clone(),
            include: settings.include,
            include_taxonomies: settings.include_taxonomies,
            full_context: settings.full_context,
        }
    }
}

/// Every document builder, sharing one store, converter and cache.
#[derive(Clone)]
pub struct MirrorServices {
    pub markdown: MarkdownService,
    pub index: IndexService,
    pub context: ContextService,
    pub taxonomy: TaxonomyArchiveService,
    pub cache: DocumentCache,
}

impl MirrorServices {
    pub fn new(
        config: MirrorConfig,
        store: Arc<dyn ContentStore>,
        converter: Arc<dyn Converter>,
        cache: DocumentCache,
    ) -> Self {
        let config = Arc::new(config);
        let markdown = MarkdownService::new(store.clone(), converter, cache.clone());
        let index = IndexService::new(
            store.clone(),
            markdown.clone(),
            cache.clone(),
            config.clone(),
        );
        let context = ContextService::new(
            index.clone(),
            markdown.clone(),
            cache.clone(),
            config.clone(),
        );
        let taxonomy = TaxonomyArchiveService::new(store, cache.clone(), config);

        Self {
            markdown,
            index,
            context,
            taxonomy,
            cache,
        }
    }

    /// Register an invalidation coordinator for this cache on `bus`.
    pub fn subscribe_invalidation(&self, bus: &MutationBus) {
        bus.subscribe(Arc::new(InvalidationCoordinator::new(self.cache.clone())));
    }
}
