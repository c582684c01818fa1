//! Content entities as seen by the mirror.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{EligibleTypes, PublishStatus, Taxonomy};

/// Per-entity opt-out flag. Any value other than `no` keeps the entity mirrored.
pub const META_INCLUDE: &str = "_md_mirror_include";
pub const META_EXCERPT: &str = "_excerpt";
pub const META_YOAST_DESCRIPTION: &str = "_yoast_wpseo_metadesc";
pub const META_RANK_MATH_DESCRIPTION: &str = "rank_math_description";
pub const META_AIOSEO_DESCRIPTION: &str = "aioseo_description";

/// Meta keys whose change invalidates the entity document and the index.
pub const WATCHED_META_KEYS: [&str; 5] = [
    META_YOAST_DESCRIPTION,
    META_INCLUDE,
    META_EXCERPT,
    META_RANK_MATH_DESCRIPTION,
    META_AIOSEO_DESCRIPTION,
];

/// SEO summary sources in lookup order.
const SEO_SUMMARY_KEYS: [&str; 3] = [
    META_YOAST_DESCRIPTION,
    META_RANK_MATH_DESCRIPTION,
    META_AIOSEO_DESCRIPTION,
];

pub fn is_watched_meta_key(key: &str) -> bool {
    WATCHED_META_KEYS.contains(&key)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEntity {
    pub id: Uuid,
    pub content_type: String,
    pub slug: String,
    pub title: String,
    pub body_html: String,
    pub excerpt: String,
    pub status: PublishStatus,
    pub published_at: OffsetDateTime,
    pub terms: Vec<Uuid>,
    pub meta: BTreeMap<String, String>,
}

impl ContentEntity {
    pub fn is_included(&self) -> bool {
        self.meta
            .get(META_INCLUDE)
            .is_none_or(|value| value.trim() != "no")
    }

    /// Published, not opted out, and of an eligible content type.
    pub fn is_eligible(&self, types: &EligibleTypes) -> bool {
        self.status.is_published()
            && self.is_included()
            && types.allows_content_type(&self.content_type)
    }

    pub fn seo_summary(&self) -> Option<&str> {
        SEO_SUMMARY_KEYS
            .iter()
            .filter_map(|key| self.meta.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Manual excerpt meta wins over the stored excerpt.
    pub fn display_excerpt(&self) -> Option<&str> {
        self.meta
            .get(META_EXCERPT)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .or_else(|| Some(self.excerpt.trim()).filter(|value| !value.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyTerm {
    pub id: Uuid,
    pub taxonomy: Taxonomy,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteOptions {
    pub title: String,
    pub description: String,
    pub custom_summary: Option<String>,
    pub eligible_types: EligibleTypes,
}

impl SiteOptions {
    /// Custom summary when set, otherwise the site description.
    pub fn summary(&self) -> &str {
        self.custom_summary
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(self.description.as_str())
    }
}
