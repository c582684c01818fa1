//! Repository traits describing content adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{ContentEntity, SiteOptions, TaxonomyTerm};
use crate::domain::types::{PublishStatus, Taxonomy};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Entity selection. Results are ordered newest publish date first.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    /// `None` selects every content type; an empty list selects nothing.
    pub content_types: Option<Vec<String>>,
    pub status: Option<PublishStatus>,
    pub term: Option<Uuid>,
}

impl EntityFilter {
    pub fn published(content_types: Vec<String>) -> Self {
        Self {
            content_types: Some(content_types),
            status: Some(PublishStatus::Published),
            term: None,
        }
    }

    pub fn in_term(mut self, term: Uuid) -> Self {
        self.term = Some(term);
        self
    }

    pub fn matches(&self, entity: &ContentEntity) -> bool {
        self.content_types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| *t == entity.content_type))
            && self.status.is_none_or(|status| status == entity.status)
            && self.term.is_none_or(|term| entity.terms.contains(&term))
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_entity(&self, id: Uuid) -> Result<Option<ContentEntity>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentEntity>, RepoError>;

    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<ContentEntity>, RepoError>;

    /// Terms of one taxonomy ordered by name. `non_empty_only` keeps terms
    /// with at least one published member.
    async fn list_taxonomy_terms(
        &self,
        taxonomy: Taxonomy,
        non_empty_only: bool,
    ) -> Result<Vec<TaxonomyTerm>, RepoError>;

    async fn find_term(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TaxonomyTerm>, RepoError>;

    async fn site_options(&self) -> Result<SiteOptions, RepoError>;
}
