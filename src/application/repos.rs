//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::articles::ValidatedArticle;
use crate::domain::entities::{
    ArticleRecord, CategoryRecord, ContentTypeRecord, ImageRecord, SiteRecord, StaffTokenRecord,
};
use crate::domain::images::ValidatedImage;
use crate::domain::types::{ContentStatus, SiteId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which articles a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleVisibility {
    /// Public status, inside the publish window, attached to the site.
    Published { site: SiteId, now: OffsetDateTime },
    /// Any status, attached to the site.
    Staff { site: SiteId },
}

impl ArticleVisibility {
    pub fn site(&self) -> SiteId {
        match self {
            ArticleVisibility::Published { site, .. } | ArticleVisibility::Staff { site } => *site,
        }
    }

    pub fn admits(&self, article: &ArticleRecord) -> bool {
        match self {
            ArticleVisibility::Published { site, now } => {
                article.is_on_site(*site) && article.is_public(*now)
            }
            ArticleVisibility::Staff { site } => article.is_on_site(*site),
        }
    }
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn find_article(
        &self,
        id: i64,
        visibility: ArticleVisibility,
    ) -> Result<Option<ArticleRecord>, RepoError>;

    /// Unscoped lookup used by editorial writes.
    async fn find_article_by_id(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    async fn create_article(&self, article: &ValidatedArticle) -> Result<ArticleRecord, RepoError>;

    async fn update_article(
        &self,
        id: i64,
        article: &ValidatedArticle,
    ) -> Result<ArticleRecord, RepoError>;

    async fn delete_article(&self, id: i64) -> Result<(), RepoError>;

    /// Returns the articles whose status was changed.
    async fn update_article_status(
        &self,
        ids: &[i64],
        status: ContentStatus,
    ) -> Result<Vec<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait ImagesRepo: Send + Sync {
    async fn find_image(&self, id: i64) -> Result<Option<ImageRecord>, RepoError>;

    async fn create_image(&self, image: &ValidatedImage) -> Result<ImageRecord, RepoError>;

    async fn update_image(&self, id: i64, image: &ValidatedImage)
    -> Result<ImageRecord, RepoError>;

    async fn delete_image(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ContentTypesRepo: Send + Sync {
    /// Case-insensitive lookup by two-character short name.
    async fn find_by_short_name(&self, code: &str)
    -> Result<Option<ContentTypeRecord>, RepoError>;
}

#[async_trait]
pub trait SitesRepo: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<SiteRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub name: String,
    pub slug: String,
    pub path: String,
    pub depth: i32,
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError>;

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<CategoryRecord>, RepoError>;

    /// Categories with exactly these paths, ordered by path.
    async fn list_by_paths(&self, paths: &[String]) -> Result<Vec<CategoryRecord>, RepoError>;

    /// Greatest existing path directly below `parent` (or at the root).
    async fn last_child_path(&self, parent: Option<&str>) -> Result<Option<String>, RepoError>;

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;
}

#[async_trait]
pub trait StaffTokensRepo: Send + Sync {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<StaffTokenRecord>, RepoError>;

    async fn create_token(&self, record: &StaffTokenRecord) -> Result<(), RepoError>;
}
