//! Root index document (`llms.txt`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::error::MirrorError;
use crate::application::markdown::MarkdownService;
use crate::application::mirror::{MirrorConfig, record_build};
use crate::application::repos::{ContentStore, EntityFilter};
use crate::cache::{CacheKey, DocumentCache};
use crate::domain::entities::{ContentEntity, TaxonomyTerm};
use crate::domain::types::Taxonomy;

const SEPARATOR: &str = "---\n\n";

#[derive(Clone)]
pub struct IndexService {
    store: Arc<dyn ContentStore>,
    markdown: MarkdownService,
    cache: DocumentCache,
    config: Arc<MirrorConfig>,
}

impl IndexService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        markdown: MarkdownService,
        cache: DocumentCache,
        config: Arc<MirrorConfig>,
    ) -> Self {
        Self {
            store,
            markdown,
            cache,
            config,
        }
    }

    #[instrument(skip_all)]
    pub async fn get_or_build(&self) -> Result<String, MirrorError> {
        if let Some(document) = self.cache.get(&CacheKey::IndexDocument) {
            return Ok(document);
        }

        let started_at = Instant::now();
        let document = self.build().await?;
        self.cache.put(&CacheKey::IndexDocument, &document);
        record_build("index", started_at);
        Ok(document)
    }

    async fn build(&self) -> Result<String, MirrorError> {
        let options = self.store.site_options().await?;
        let entities: Vec<ContentEntity> = self
            .store
            .list_entities(&EntityFilter::published(
                options.eligible_types.content_types(),
            ))
            .await?
            .into_iter()
            .filter(|entity| entity.is_eligible(&options.eligible_types))
            .collect();

        debug!(entity_count = entities.len(), "Building index document");

        let mut out = format!("# {}\n\n> {}\n\n", options.title, options.summary());

        let mut term_names: HashMap<Uuid, TaxonomyTerm> = HashMap::new();
        if self.config.include_taxonomies {
            for taxonomy in Taxonomy::ALL {
                out.push_str(&format!("## {}\n\n", taxonomy.label()));
                for term in self.store.list_taxonomy_terms(taxonomy, true).await? {
                    self.write_term_section(&mut out, &term, &entities);
                }
                for term in self.store.list_taxonomy_terms(taxonomy, false).await? {
                    term_names.insert(term.id, term);
                }
            }
        }

        out.push_str("## Available Content\n\n");
        for entity in &entities {
            self.write_entry(&mut out, entity, &term_names)?;
        }

        Ok(out)
    }

    fn write_term_section(&self, out: &mut String, term: &TaxonomyTerm, entities: &[ContentEntity]) {
        out.push_str(&format!("### {}\n\n", term.name));
        if let Some(description) = term
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            out.push_str(&format!("_{description}_\n\n"));
        }
        for entity in entities.iter().filter(|entity| entity.terms.contains(&term.id)) {
            out.push_str(&format!(
                "- [{}]({})\n",
                entity.title,
                self.config.mirror_url(&entity.slug)
            ));
        }
        out.push('\n');
        out.push_str(SEPARATOR);
    }

    fn write_entry(
        &self,
        out: &mut String,
        entity: &ContentEntity,
        terms: &HashMap<Uuid, TaxonomyTerm>,
    ) -> Result<(), MirrorError> {
        let include = self.config.include;

        if include.title {
            out.push_str(&format!(
                "### [{}]({})\n\n",
                entity.title,
                self.config.mirror_url(&entity.slug)
            ));
        }

        let seo_summary = entity.seo_summary();
        if include.seo_summary
            && let Some(summary) = seo_summary
        {
            out.push_str(&format!("_Meta: {summary}_\n\n"));
        }

        if include.excerpt
            && let Some(excerpt) = entity.display_excerpt()
            && Some(excerpt) != seo_summary
        {
            out.push_str(&format!("{excerpt}\n\n"));
        }

        if include.content {
            let document = self.markdown.document_for(entity)?;
            out.push_str(&format!("{document}\n\n"));
        }

        if self.config.include_taxonomies {
            for taxonomy in Taxonomy::ALL {
                let names: Vec<&str> = entity
                    .terms
                    .iter()
                    .filter_map(|id| terms.get(id))
                    .filter(|term| term.taxonomy == taxonomy)
                    .map(|term| term.name.as_str())
                    .collect();
                if !names.is_empty() {
                    out.push_str(&format!("**{}:** {}\n\n", taxonomy.label(), names.join(", ")));
                }
            }
        }

        out.push_str(SEPARATOR);
        Ok(())
    }
}
