//! Shared domain enumerations and the eligible-type set.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    Published,
    Trashed,
}

impl PublishStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
            PublishStatus::Trashed => "trashed",
        }
    }

    pub fn is_published(self) -> bool {
        matches!(self, PublishStatus::Published)
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(PublishStatus::Draft),
            "published" | "publish" => Ok(PublishStatus::Published),
            "trashed" | "trash" => Ok(PublishStatus::Trashed),
            other => Err(DomainError::validation(format!(
                "unknown publish status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    pub const ALL: [Taxonomy; 2] = [Taxonomy::Category, Taxonomy::Tag];

    /// Path segment and cache-key fragment.
    pub fn as_str(self) -> &'static str {
        match self {
            Taxonomy::Category => "category",
            Taxonomy::Tag => "tag",
        }
    }

    /// Heading used when grouping the index by taxonomy.
    pub fn label(self) -> &'static str {
        match self {
            Taxonomy::Category => "Categories",
            Taxonomy::Tag => "Tags",
        }
    }

    /// Pseudo content type that enables archive documents for this taxonomy.
    pub fn archive_type(self) -> String {
        format!("tax_{}", self.as_str())
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Taxonomy {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "category" => Ok(Taxonomy::Category),
            "tag" | "post_tag" => Ok(Taxonomy::Tag),
            other => Err(DomainError::validation(format!(
                "unknown taxonomy `{other}`"
            ))),
        }
    }
}

/// Content types and taxonomy pseudo-types that are mirrored.
///
/// Taxonomy archives are enabled with entries of the form `tax_<taxonomy>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EligibleTypes(BTreeSet<String>);

impl EligibleTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            types
                .into_iter()
                .map(Into::into)
                .map(|value: String| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect(),
        )
    }

    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.0.contains(content_type)
    }

    pub fn allows_archive(&self, taxonomy: Taxonomy) -> bool {
        self.0.contains(&taxonomy.archive_type())
    }

    /// Plain content types, excluding taxonomy pseudo-types.
    pub fn content_types(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|value| !value.starts_with("tax_"))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for EligibleTypes {
    fn default() -> Self {
        Self::new(["post", "page"])
    }
}
