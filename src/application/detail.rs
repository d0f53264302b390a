//! Detail page resolution: permalink → cached page, redirect, or object to render.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use crate::application::content_types::{ContentTypeError, ContentTypeResolver};
use crate::application::repos::{ArticleVisibility, ArticlesRepo, CategoriesRepo, RepoError};
use crate::cache::{ContentCache, Lookup};
use crate::domain::categories::expand_paths;
use crate::domain::content_types::ContentModel;
use crate::domain::entities::{ArticleRecord, CategoryRecord};
use crate::domain::permalink::{
    PermalinkError, PermalinkTail, canonical_path, parse_url_date, permalink_date,
};
use crate::domain::types::SiteId;

const SOURCE: &str = "broadsheet::detail";

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Permalink(#[from] PermalinkError),
    #[error("no content type uses code `{code}`")]
    UnknownContentType { code: String },
    #[error("content type resolution failed: {0}")]
    ContentType(#[from] ContentTypeError),
    #[error("{model} {id} not found")]
    NotFound { model: &'static str, id: i64 },
    #[error("{model} {id} has no usable canonical url")]
    NoCanonicalUrl { model: &'static str, id: i64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl DetailError {
    /// Everything except resolution and store failures surfaces as not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DetailError::Permalink(_)
                | DetailError::UnknownContentType { .. }
                | DetailError::NotFound { .. }
                | DetailError::NoCanonicalUrl { .. }
        )
    }
}

/// One detail page request as parsed from the URL.
#[derive(Debug, Clone, Copy)]
pub struct DetailRequest<'a> {
    pub year: &'a str,
    pub month: &'a str,
    pub day: &'a str,
    pub permalink: &'a str,
    pub staff: bool,
    pub clear_cache: bool,
}

impl DetailRequest<'_> {
    /// Only staff may bypass the cache.
    pub fn bypasses_cache(&self) -> bool {
        self.staff && self.clear_cache
    }
}

#[derive(Debug)]
pub enum DetailOutcome {
    /// Previously rendered page, returned as is.
    CachedPage(String),
    /// Permanent redirect target.
    Redirect(String),
    Render(Box<DetailPage>),
}

/// Everything the template needs, plus where to store the rendered page.
#[derive(Debug, Clone)]
pub struct DetailPage {
    pub model: ContentModel,
    pub article: ArticleRecord,
    pub categories: Vec<CategoryRecord>,
    pub canonical_path: String,
    pub page_cache_key: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DetailSettings {
    pub site_id: SiteId,
    pub html_ttl: Option<Duration>,
}

#[derive(Clone)]
pub struct ContentDetailService {
    articles: Arc<dyn ArticlesRepo>,
    categories: Arc<dyn CategoriesRepo>,
    content_types: ContentTypeResolver,
    cache: ContentCache,
    settings: DetailSettings,
}

impl ContentDetailService {
    pub fn new(
        articles: Arc<dyn ArticlesRepo>,
        categories: Arc<dyn CategoriesRepo>,
        content_types: ContentTypeResolver,
        cache: ContentCache,
        settings: DetailSettings,
    ) -> Self {
        Self {
            articles,
            categories,
            content_types,
            cache,
            settings,
        }
    }

    pub async fn resolve(&self, request: DetailRequest<'_>) -> Result<DetailOutcome, DetailError> {
        self.resolve_at(request, OffsetDateTime::now_utc()).await
    }

    pub async fn resolve_at(
        &self,
        request: DetailRequest<'_>,
        now: OffsetDateTime,
    ) -> Result<DetailOutcome, DetailError> {
        let requested_date = parse_url_date(request.year, request.month, request.day)?;
        let tail = PermalinkTail::parse(request.permalink)?;

        let content_type = self
            .content_types
            .resolve(&tail.type_code)
            .await?
            .ok_or_else(|| DetailError::UnknownContentType {
                code: tail.type_code.clone(),
            })?;
        let model = content_type.model;

        let site = self.settings.site_id;
        let keys = self.cache.keys();
        let primary_key = keys.key(model.name(), Some(tail.id), Some(site));
        let html_key = keys.html_key(&primary_key);
        let bypass = request.bypasses_cache();

        if !bypass
            && self.settings.html_ttl.is_some()
            && let Some(page) = self.cached_page(&html_key).await
        {
            return Ok(DetailOutcome::CachedPage(page));
        }

        let article = match model {
            ContentModel::Article => self.load_article(&request, tail.id, now).await?,
        };

        if article.is_offsite() {
            let target = external_target(&article).ok_or(DetailError::NoCanonicalUrl {
                model: model.name(),
                id: article.id,
            })?;
            return Ok(DetailOutcome::Redirect(target));
        }

        let canonical_date = permalink_date(article.publish_at);
        let canonical = canonical_path(
            canonical_date,
            &article.slug,
            &content_type.short_name,
            article.id,
        );
        if tail.slug != article.slug
            || tail.type_code != content_type.short_name
            || requested_date != canonical_date
        {
            debug!(
                target = SOURCE,
                id = article.id,
                requested = request.permalink,
                canonical = %canonical,
                "redirecting to canonical permalink"
            );
            return Ok(DetailOutcome::Redirect(canonical));
        }

        let categories = self
            .load_categories(&article, &primary_key, &request)
            .await?;

        let page_cache_key =
            (self.settings.html_ttl.is_some() && !request.staff).then_some(html_key);

        Ok(DetailOutcome::Render(Box::new(DetailPage {
            model,
            article,
            categories,
            canonical_path: canonical,
            page_cache_key,
        })))
    }

    /// Store a rendered page. Failures are logged; the response is unaffected.
    pub async fn store_page(&self, key: &str, html: &str) {
        let Some(ttl) = self.settings.html_ttl else {
            return;
        };
        if let Err(err) = self
            .cache
            .store()
            .set_json_with_ttl(key, html, ttl)
            .await
        {
            warn!(
                target = "broadsheet::cache",
                key,
                error = %err,
                "page cache write failed"
            );
        }
    }

    async fn cached_page(&self, html_key: &str) -> Option<String> {
        let found = match self.cache.store().get_json::<String>(html_key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    target = "broadsheet::cache",
                    key = html_key,
                    error = %err,
                    "page cache lookup failed; treating as miss"
                );
                None
            }
        };
        let outcome = if found.is_some() {
            "broadsheet_cache_hit_total"
        } else {
            "broadsheet_cache_miss_total"
        };
        counter!(outcome, "layer" => "html").increment(1);
        found
    }

    async fn load_article(
        &self,
        request: &DetailRequest<'_>,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<ArticleRecord, DetailError> {
        let site = self.settings.site_id;
        let model = ContentModel::Article.name();
        let not_found = || DetailError::NotFound { model, id };
        let visibility = if request.staff {
            ArticleVisibility::Staff { site }
        } else {
            ArticleVisibility::Published { site, now }
        };

        if !request.bypasses_cache()
            && let Some(article) = self
                .cache
                .get::<ArticleRecord>(model, Some(site), Lookup::by_id(id))
                .await
        {
            // Cached copies may have expired since they were written.
            return visibility
                .admits(&article)
                .then_some(article)
                .ok_or_else(not_found);
        }

        let article = self
            .articles
            .find_article(id, visibility)
            .await?
            .ok_or_else(not_found)?;

        if request.bypasses_cache() {
            if let Err(err) = self.cache.purge(&article, Some(site)).await {
                warn!(
                    target = "broadsheet::cache",
                    id,
                    error = %err,
                    "staff cache clear failed"
                );
            }
        } else if !request.staff
            && let Err(err) = self.cache.populate(&article, Some(site)).await
        {
            warn!(
                target = "broadsheet::cache",
                id,
                error = %err,
                "object cache write failed"
            );
        }

        Ok(article)
    }

    /// The article's categories plus all their ancestors, ordered by path.
    async fn load_categories(
        &self,
        article: &ArticleRecord,
        primary_key: &str,
        request: &DetailRequest<'_>,
    ) -> Result<Vec<CategoryRecord>, DetailError> {
        if article.category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.cache.keys().derived_key(primary_key, "categories");
        if !request.bypasses_cache()
            && let Ok(Some(cached)) = self
                .cache
                .store()
                .get_json::<Vec<CategoryRecord>>(&key)
                .await
        {
            return Ok(cached);
        }

        let direct = self.categories.list_by_ids(&article.category_ids).await?;
        let paths = expand_paths(direct.iter().map(|c| c.path.as_str()));
        let expanded = self.categories.list_by_paths(&paths).await?;

        if !request.staff
            && let Err(err) = self.cache.store().set_json(&key, &expanded).await
        {
            warn!(
                target = "broadsheet::cache",
                key = %key,
                error = %err,
                "category cache write failed"
            );
        }
        Ok(expanded)
    }
}

fn external_target(article: &ArticleRecord) -> Option<String> {
    let raw = article.external_url.trim();
    if raw.is_empty() {
        return None;
    }
    Url::parse(raw).ok().map(|_| raw.to_string())
}
