//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

pub type SiteId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_status", rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Public,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "article_type", rename_all = "snake_case")]
pub enum ArticleType {
    Internal,
    External,
    Aggregated,
}

impl ArticleType {
    /// Offsite articles link out instead of rendering a body.
    pub fn is_offsite(self) -> bool {
        matches!(self, ArticleType::External | ArticleType::Aggregated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArticleType::Internal => "internal",
            ArticleType::External => "external",
            ArticleType::Aggregated => "aggregated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "crop_direction", rename_all = "snake_case")]
pub enum CropDirection {
    Top,
    Bottom,
    Right,
    Left,
    #[default]
    Center,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsite_types() {
        assert!(!ArticleType::Internal.is_offsite());
        assert!(ArticleType::External.is_offsite());
        assert!(ArticleType::Aggregated.is_offsite());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        let json = serde_json::to_string(&ContentStatus::Public).expect("serialize");
        assert_eq!(json, "\"public\"");
        let parsed: ArticleType = serde_json::from_str("\"aggregated\"").expect("parse");
        assert_eq!(parsed, ArticleType::Aggregated);
    }
}
