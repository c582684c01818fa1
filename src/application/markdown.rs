use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;
use uuid::Uuid;

use crate::application::convert::Converter;
use crate::application::error::{MirrorError, Subject};
use crate::application::mirror::record_build;
use crate::application::repos::ContentStore;
use crate::cache::{CacheKey, DocumentCache};
use crate::domain::entities::ContentEntity;

/// Produces and caches the Markdown document of one entity.
#[derive(Clone)]
pub struct MarkdownService {
    store: Arc<dyn ContentStore>,
    converter: Arc<dyn Converter>,
    cache: DocumentCache,
}

impl MarkdownService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        converter: Arc<dyn Converter>,
        cache: DocumentCache,
    ) -> Self {
        Self {
            store,
            converter,
            cache,
        }
    }

    #[instrument(skip_all, fields(entity_id = %entity_id))]
    pub async fn get_or_build(&self, entity_id: Uuid) -> Result<String, MirrorError> {
        if let Some(document) = self.cache.get(&CacheKey::EntityMarkdown(entity_id)) {
            return Ok(document);
        }

        let entity = self
            .store
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| MirrorError::not_found(Subject::Content, entity_id.to_string()))?;

        self.build(&entity)
    }

    /// Serving path: the slug must name an eligible entity.
    #[instrument(skip_all, fields(slug = %slug))]
    pub async fn get_or_build_eligible(&self, slug: &str) -> Result<String, MirrorError> {
        let entity = self.resolve_eligible(slug).await?;
        self.document_for(&entity)
    }

    pub async fn resolve_eligible(&self, slug: &str) -> Result<ContentEntity, MirrorError> {
        let entity = self
            .store
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| MirrorError::not_found(Subject::Content, slug))?;

        let options = self.store.site_options().await?;
        if !entity.is_eligible(&options.eligible_types) {
            return Err(MirrorError::excluded(Subject::Content, slug));
        }

        Ok(entity)
    }

    /// Cached document for an entity the caller already loaded.
    pub fn document_for(&self, entity: &ContentEntity) -> Result<String, MirrorError> {
        match self.cache.get(&CacheKey::EntityMarkdown(entity.id)) {
            Some(document) => Ok(document),
            None => self.build(entity),
        }
    }

    fn build(&self, entity: &ContentEntity) -> Result<String, MirrorError> {
        let started_at = Instant::now();
        let body = self.converter.convert(&entity.body_html)?;
        let document = render_document(&entity.title, &body);

        self.cache
            .put(&CacheKey::EntityMarkdown(entity.id), &document);
        record_build("entity", started_at);
        Ok(document)
    }
}

/// `# <title>` followed by the converted body. No heading for an empty title.
pub fn render_document(title: &str, body: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        body.to_string()
    } else {
        format!("# {title}\n\n{body}")
    }
}
