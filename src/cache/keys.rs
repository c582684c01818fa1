//! Cache key definitions.

use std::fmt;

use uuid::Uuid;

use crate::domain::types::Taxonomy;

/// Every document the mirror caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Markdown rendering of one entity.
    EntityMarkdown(Uuid),
    /// The `llms.txt` index.
    IndexDocument,
    /// Link-stripped context document.
    BasicContext,
    /// Link-expanded context document.
    FullContext,
    /// Listing of one taxonomy term. Lives in the taxonomy group.
    TaxonomyArchive { taxonomy: Taxonomy, term_id: Uuid },
}

impl CacheKey {
    /// Key string as stored in the cache group.
    pub fn render(&self) -> String {
        match self {
            CacheKey::EntityMarkdown(id) => format!("post_{id}_markdown"),
            CacheKey::IndexDocument => "llms_txt_content".to_string(),
            CacheKey::BasicContext => "md_mirror_basic_context".to_string(),
            CacheKey::FullContext => "md_mirror_full_context".to_string(),
            CacheKey::TaxonomyArchive { taxonomy, term_id } => {
                format!("md_mirror_tax_{}_{term_id}", taxonomy.as_str())
            }
        }
    }

    /// Low-cardinality label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::EntityMarkdown(_) => "entity",
            CacheKey::IndexDocument => "index",
            CacheKey::BasicContext => "basic_context",
            CacheKey::FullContext => "full_context",
            CacheKey::TaxonomyArchive { .. } => "taxonomy",
        }
    }

    pub fn is_taxonomy(&self) -> bool {
        matches!(self, CacheKey::TaxonomyArchive { .. })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
