//! Editorial writes. Every write drops the affected cache entries once the
//! store has committed it.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::repos::{
    ArticlesRepo, ArticlesWriteRepo, CategoriesRepo, CreateCategoryParams, ImagesRepo, RepoError,
};
use crate::cache::{CacheIdentity, CacheInvalidator};
use crate::domain::articles::ArticleDraft;
use crate::domain::categories::{category_slug, depth_of, next_child_path};
use crate::domain::entities::{ArticleRecord, CategoryRecord, ImageRecord};
use crate::domain::error::DomainError;
use crate::domain::images::ImageDraft;
use crate::domain::types::ContentStatus;

const SOURCE: &str = "broadsheet::editorial";

#[derive(Debug, Error)]
pub enum EditorialError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateCategoryCommand {
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Clone)]
pub struct EditorialService {
    articles: Arc<dyn ArticlesRepo>,
    article_writer: Arc<dyn ArticlesWriteRepo>,
    images: Arc<dyn ImagesRepo>,
    categories: Arc<dyn CategoriesRepo>,
    invalidator: CacheInvalidator,
}

impl EditorialService {
    pub fn new(
        articles: Arc<dyn ArticlesRepo>,
        article_writer: Arc<dyn ArticlesWriteRepo>,
        images: Arc<dyn ImagesRepo>,
        categories: Arc<dyn CategoriesRepo>,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            articles,
            article_writer,
            images,
            categories,
            invalidator,
        }
    }

    /// Create (`id` = `None`) or replace an article.
    pub async fn save_article(
        &self,
        actor: &str,
        id: Option<i64>,
        draft: ArticleDraft,
    ) -> Result<ArticleRecord, EditorialError> {
        let validated = draft.validate(OffsetDateTime::now_utc())?;

        let (saved, previous) = match id {
            None => (self.article_writer.create_article(&validated).await?, None),
            Some(id) => {
                let previous = self
                    .articles
                    .find_article_by_id(id)
                    .await?
                    .ok_or(EditorialError::NotFound {
                        entity: "article",
                        id,
                    })?;
                let saved = self.article_writer.update_article(id, &validated).await?;
                (saved, Some(previous))
            }
        };

        // A renamed article leaves a slug entry under its old slug.
        if let Some(previous) = previous.filter(|p| p.slug != saved.slug) {
            self.invalidate(&previous).await;
        }
        self.invalidate(&saved).await;

        info!(
            target = SOURCE,
            actor,
            id = saved.id,
            slug = %saved.slug,
            status = saved.status.as_str(),
            "article saved"
        );
        Ok(saved)
    }

    pub async fn delete_article(&self, actor: &str, id: i64) -> Result<(), EditorialError> {
        let existing = self
            .articles
            .find_article_by_id(id)
            .await?
            .ok_or(EditorialError::NotFound {
                entity: "article",
                id,
            })?;
        self.article_writer.delete_article(id).await?;
        self.invalidate_deleted(&existing).await;

        info!(target = SOURCE, actor, id, "article deleted");
        Ok(())
    }

    /// Bulk make-public / make-draft. Returns the articles that changed.
    pub async fn set_article_status(
        &self,
        actor: &str,
        ids: &[i64],
        status: ContentStatus,
    ) -> Result<Vec<ArticleRecord>, EditorialError> {
        if ids.is_empty() {
            return Err(DomainError::validation("no articles selected").into());
        }
        let updated = self
            .article_writer
            .update_article_status(ids, status)
            .await?;
        for article in &updated {
            self.invalidate(article).await;
        }

        info!(
            target = SOURCE,
            actor,
            requested = ids.len(),
            updated = updated.len(),
            status = status.as_str(),
            "article status changed"
        );
        Ok(updated)
    }

    pub async fn save_image(
        &self,
        actor: &str,
        id: Option<i64>,
        draft: ImageDraft,
    ) -> Result<ImageRecord, EditorialError> {
        let validated = draft.validate(OffsetDateTime::now_utc())?;

        let (saved, previous) = match id {
            None => (self.images.create_image(&validated).await?, None),
            Some(id) => {
                let previous =
                    self.images
                        .find_image(id)
                        .await?
                        .ok_or(EditorialError::NotFound {
                            entity: "image",
                            id,
                        })?;
                (
                    self.images.update_image(id, &validated).await?,
                    Some(previous),
                )
            }
        };

        if let Some(previous) = previous.filter(|p| p.slug != saved.slug) {
            self.invalidate(&previous).await;
        }
        self.invalidate(&saved).await;

        info!(
            target = SOURCE,
            actor,
            id = saved.id,
            file_path = %saved.file_path,
            "image saved"
        );
        Ok(saved)
    }

    pub async fn delete_image(&self, actor: &str, id: i64) -> Result<(), EditorialError> {
        let existing = self
            .images
            .find_image(id)
            .await?
            .ok_or(EditorialError::NotFound { entity: "image", id })?;
        self.images.delete_image(id).await?;
        self.invalidate_deleted(&existing).await;

        info!(target = SOURCE, actor, id, "image deleted");
        Ok(())
    }

    /// Append a category below `parent_id`, or at the root.
    pub async fn create_category(
        &self,
        actor: &str,
        command: CreateCategoryCommand,
    ) -> Result<CategoryRecord, EditorialError> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name is required").into());
        }

        let parent = match command.parent_id {
            Some(parent_id) => Some(
                self.categories
                    .find_category(parent_id)
                    .await?
                    .ok_or(EditorialError::NotFound {
                        entity: "category",
                        id: parent_id,
                    })?,
            ),
            None => None,
        };
        let parent_path = parent.as_ref().map(|p| p.path.as_str());

        let last_sibling = self.categories.last_child_path(parent_path).await?;
        let path = next_child_path(parent_path, last_sibling.as_deref())?;

        let created = self
            .categories
            .create_category(CreateCategoryParams {
                name: name.to_string(),
                slug: category_slug(&path),
                depth: depth_of(&path),
                path,
            })
            .await?;

        info!(
            target = SOURCE,
            actor,
            id = created.id,
            path = %created.path,
            "category created"
        );
        Ok(created)
    }

    async fn invalidate<T: CacheIdentity + ?Sized>(&self, item: &T) {
        let report = self.invalidator.after_save(item).await;
        report.log_failures(item.cache_model(), item.cache_id());
    }

    async fn invalidate_deleted<T: CacheIdentity + ?Sized>(&self, item: &T) {
        let report = self.invalidator.after_delete(item).await;
        report.log_failures(item.cache_model(), item.cache_id());
    }
}
