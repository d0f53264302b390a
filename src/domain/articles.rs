//! Article visibility and editorial rules.

use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use crate::domain::entities::ArticleRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::resolve_content_slug;
use crate::domain::types::{ArticleType, ContentStatus, SiteId};

impl ArticleRecord {
    /// Public, already published, and not yet expired.
    pub fn is_public(&self, now: OffsetDateTime) -> bool {
        self.status == ContentStatus::Public
            && self.publish_at <= now
            && self.expires_at.is_none_or(|expires_at| expires_at >= now)
    }

    pub fn is_offsite(&self) -> bool {
        self.article_type.is_offsite()
    }

    pub fn is_on_site(&self, site_id: SiteId) -> bool {
        self.site_ids.contains(&site_id)
    }

    /// Byline shown to readers: the one-off byline wins over staff authors.
    pub fn display_byline(&self) -> Option<&str> {
        let trimmed = self.byline.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Article fields as submitted by an editor, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default = "default_status")]
    pub status: ContentStatus,
    #[serde(default = "default_true")]
    pub allow_comments: bool,
    #[serde(default = "default_true")]
    pub display_comments: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub byline: String,
    #[serde(default)]
    pub credit_line: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub footer: String,
    #[serde(default)]
    pub dateline: String,
    #[serde(default = "default_article_type")]
    pub article_type: ArticleType,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub site_ids: Vec<SiteId>,
    #[serde(default)]
    pub primary_site_id: Option<SiteId>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

fn default_status() -> ContentStatus {
    ContentStatus::Public
}

fn default_true() -> bool {
    true
}

fn default_article_type() -> ArticleType {
    ArticleType::Internal
}

/// A draft that passed validation, with timestamps normalized for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArticle {
    pub title: String,
    pub slug: String,
    pub status: ContentStatus,
    pub allow_comments: bool,
    pub display_comments: bool,
    pub featured: bool,
    pub publish_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub byline: String,
    pub credit_line: String,
    pub summary: String,
    pub body: String,
    pub footer: String,
    pub dateline: String,
    pub article_type: ArticleType,
    pub external_url: String,
    pub site_ids: Vec<SiteId>,
    pub primary_site_id: Option<SiteId>,
    pub category_ids: Vec<i64>,
}

impl ArticleDraft {
    /// Apply the editorial rules. `now` fills a missing publish time.
    pub fn validate(self, now: OffsetDateTime) -> Result<ValidatedArticle, DomainError> {
        let title = straighten_quotes(self.title.trim());
        if title.is_empty() {
            return Err(DomainError::validation("Articles must have a title."));
        }

        let slug = resolve_content_slug(self.slug.as_deref(), &title)
            .map_err(|err| DomainError::validation(err.to_string()))?;

        let external_url = self.external_url.trim().to_string();
        match self.article_type {
            ArticleType::Internal => {
                if self.body.trim().is_empty() {
                    return Err(DomainError::validation("Internal articles must have a body."));
                }
            }
            ArticleType::External => {
                require_destination(&external_url, "External")?;
            }
            ArticleType::Aggregated => {
                require_destination(&external_url, "Aggregated")?;
            }
        }

        if self.site_ids.is_empty() {
            return Err(DomainError::validation(
                "Articles must be assigned to at least one site.",
            ));
        }
        if let Some(primary) = self.primary_site_id
            && !self.site_ids.contains(&primary)
        {
            return Err(DomainError::validation(
                "The primary site must be one of the article's sites.",
            ));
        }

        let publish_at = self.publish_at.unwrap_or(now);
        let (updated_at, expires_at) = normalize_timestamps(publish_at, self.updated_at, self.expires_at);

        let mut site_ids = self.site_ids;
        site_ids.sort_unstable();
        site_ids.dedup();
        let mut category_ids = self.category_ids;
        category_ids.sort_unstable();
        category_ids.dedup();

        Ok(ValidatedArticle {
            title,
            slug,
            status: self.status,
            allow_comments: self.allow_comments,
            display_comments: self.display_comments,
            featured: self.featured,
            publish_at,
            updated_at,
            expires_at,
            byline: self.byline.trim().to_string(),
            credit_line: self.credit_line.trim().to_string(),
            summary: self.summary,
            body: self.body,
            footer: self.footer,
            dateline: self.dateline.trim().to_string(),
            article_type: self.article_type,
            external_url,
            site_ids,
            primary_site_id: self.primary_site_id,
            category_ids,
        })
    }
}

fn require_destination(url: &str, label: &str) -> Result<(), DomainError> {
    if url.is_empty() {
        return Err(DomainError::validation(format!(
            "{label} articles must have a destination URL defined."
        )));
    }
    Url::parse(url).map_err(|err| {
        DomainError::validation(format!("{label} article destination `{url}` is invalid: {err}"))
    })?;
    Ok(())
}

/// Updated time never predates publishing and defaults to it; expiry is
/// clamped to the publish time.
pub fn normalize_timestamps(
    publish_at: OffsetDateTime,
    updated_at: Option<OffsetDateTime>,
    expires_at: Option<OffsetDateTime>,
) -> (OffsetDateTime, Option<OffsetDateTime>) {
    let updated_at = match updated_at {
        Some(value) if value >= publish_at => value,
        _ => publish_at,
    };
    let expires_at = expires_at.map(|value| value.max(publish_at));
    (updated_at, expires_at)
}

fn straighten_quotes(input: &str) -> String {
    input
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
}
