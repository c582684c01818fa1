use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::application::error::{MirrorError, Subject};
use crate::application::mirror::{MirrorConfig, record_build};
use crate::application::repos::{ContentStore, EntityFilter};
use crate::cache::{CacheKey, DocumentCache};
use crate::domain::entities::{ContentEntity, TaxonomyTerm};
use crate::domain::types::Taxonomy;

/// Per-term archive listings, enabled through `tax_<taxonomy>` eligible types.
#[derive(Clone)]
pub struct TaxonomyArchiveService {
    store: Arc<dyn ContentStore>,
    cache: DocumentCache,
    config: Arc<MirrorConfig>,
}

impl TaxonomyArchiveService {
    pub fn new(store: Arc<dyn ContentStore>, cache: DocumentCache, config: Arc<MirrorConfig>) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    #[instrument(skip_all, fields(taxonomy = %taxonomy, term = %term_slug))]
    pub async fn get_or_build(
        &self,
        taxonomy: Taxonomy,
        term_slug: &str,
    ) -> Result<String, MirrorError> {
        let options = self.store.site_options().await?;
        if !options.eligible_types.allows_archive(taxonomy) {
            return Err(MirrorError::excluded(
                Subject::TaxonomyArchive,
                taxonomy.as_str(),
            ));
        }

        let term = self
            .store
            .find_term(taxonomy, term_slug)
            .await?
            .ok_or_else(|| MirrorError::not_found(Subject::TaxonomyTerm, term_slug))?;

        let key = CacheKey::TaxonomyArchive {
            taxonomy,
            term_id: term.id,
        };
        if let Some(document) = self.cache.get(&key) {
            return Ok(document);
        }

        let started_at = Instant::now();
        let members: Vec<ContentEntity> = self
            .store
            .list_entities(
                &EntityFilter::published(options.eligible_types.content_types()).in_term(term.id),
            )
            .await?
            .into_iter()
            .filter(|entity| entity.is_eligible(&options.eligible_types))
            .collect();

        let document = self.render(&term, &members);
        self.cache.put(&key, &document);
        record_build("taxonomy_archive", started_at);
        Ok(document)
    }

    fn render(&self, term: &TaxonomyTerm, members: &[ContentEntity]) -> String {
        let mut out = format!("# {}\n\n", term.name);
        if let Some(description) = term
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            out.push_str(&format!("{description}\n\n"));
        }

        for entity in members {
            out.push_str(&format!(
                "## [{}]({})\n\n",
                entity.title,
                self.config.mirror_url(&entity.slug)
            ));
            if let Some(excerpt) = entity.display_excerpt() {
                out.push_str(&format!("{excerpt}\n\n"));
            }
            out.push_str("---\n\n");
        }

        out
    }
}
