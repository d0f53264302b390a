//! Cache invalidation run after content is saved or deleted.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::{RepoError, SitesRepo};
use crate::domain::content_types::ContentModel;
use crate::domain::entities::{ArticleRecord, ImageRecord};
use crate::domain::types::SiteId;

use super::backend::CacheError;
use super::keys::CacheKeyFormatter;
use super::store::CacheStore;

const SOURCE: &str = "broadsheet::cache::invalidation";

/// How a content object is addressed in the cache.
pub trait CacheIdentity {
    fn cache_model(&self) -> &'static str;

    fn cache_id(&self) -> i64;

    fn cache_slug(&self) -> &str;

    /// Types owning more cached data than their primary and slug entries
    /// expose it here.
    fn extra_invalidation(&self) -> Option<&dyn Invalidatable> {
        None
    }
}

/// Capability for objects that own additional cache entries.
pub trait Invalidatable {
    /// Keys to drop alongside the primary key. `site` is `None` for the
    /// unscoped pass.
    fn extra_keys(&self, keys: &CacheKeyFormatter, site: Option<SiteId>) -> Vec<String>;
}

#[derive(Debug)]
pub struct InvalidationFailure {
    pub key: String,
    pub error: CacheError,
}

/// Outcome of one invalidation pass.
#[derive(Debug, Default)]
pub struct InvalidationReport {
    pub deleted: usize,
    pub failures: Vec<InvalidationFailure>,
    /// Set when the site list could not be read; only the unscoped and
    /// configured-site keys were dropped.
    pub site_listing: Option<RepoError>,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.site_listing.is_none()
    }

    /// Log every failed deletion at `warn`.
    pub fn log_failures(&self, model: &str, id: i64) {
        if let Some(err) = &self.site_listing {
            warn!(
                target = SOURCE,
                model,
                id,
                error = %err,
                "sites could not be listed; other sites keep their entries"
            );
        }
        for failure in &self.failures {
            warn!(
                target = SOURCE,
                model,
                id,
                key = %failure.key,
                error = %failure.error,
                "cache key could not be invalidated"
            );
        }
    }
}

#[derive(Clone)]
pub struct CacheInvalidator {
    store: CacheStore,
    keys: CacheKeyFormatter,
    sites: Arc<dyn SitesRepo>,
    /// The site this process serves; its keys are dropped even when the site
    /// list is unavailable.
    site_id: SiteId,
}

impl CacheInvalidator {
    pub fn new(
        store: CacheStore,
        keys: CacheKeyFormatter,
        sites: Arc<dyn SitesRepo>,
        site_id: SiteId,
    ) -> Self {
        Self {
            store,
            keys,
            sites,
            site_id,
        }
    }

    /// Drop every entry derived from `item` after its write committed.
    pub async fn after_save<T: CacheIdentity + ?Sized>(&self, item: &T) -> InvalidationReport {
        self.invalidate(item, "save").await
    }

    pub async fn after_delete<T: CacheIdentity + ?Sized>(&self, item: &T) -> InvalidationReport {
        self.invalidate(item, "delete").await
    }

    async fn invalidate<T: CacheIdentity + ?Sized>(
        &self,
        item: &T,
        reason: &'static str,
    ) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        let mut attempted = HashSet::new();

        let local = self.keys_for(item, &[self.site_id]);
        self.delete_all(local, &mut attempted, &mut report).await;

        let site_ids: Vec<SiteId> = match self.sites.list_sites().await {
            Ok(sites) => sites.into_iter().map(|site| site.id).collect(),
            Err(err) => {
                counter!("broadsheet_cache_invalidation_failures_total").increment(1);
                report.site_listing = Some(err);
                Vec::new()
            }
        };
        let remote = self.keys_for(item, &site_ids);
        self.delete_all(remote, &mut attempted, &mut report).await;

        debug!(
            target = SOURCE,
            reason,
            model = item.cache_model(),
            id = item.cache_id(),
            sites = site_ids.len(),
            deleted = report.deleted,
            failed = report.failures.len(),
            "cache invalidated"
        );
        report
    }

    async fn delete_all(
        &self,
        keys: Vec<String>,
        attempted: &mut HashSet<String>,
        report: &mut InvalidationReport,
    ) {
        for key in keys {
            if !attempted.insert(key.clone()) {
                continue;
            }
            match self.store.delete(&key).await {
                Ok(()) => report.deleted += 1,
                Err(error) => {
                    counter!("broadsheet_cache_invalidation_failures_total").increment(1);
                    report.failures.push(InvalidationFailure { key, error });
                }
            }
        }
    }

    /// Keys in deletion order: primary and extras (unscoped, then per site),
    /// followed by slug entries (unscoped, then per site).
    pub fn keys_for<T: CacheIdentity + ?Sized>(&self, item: &T, site_ids: &[SiteId]) -> Vec<String> {
        let model = item.cache_model();
        let id = item.cache_id();
        let extra = item.extra_invalidation();
        let scopes = std::iter::once(None).chain(site_ids.iter().copied().map(Some));

        let mut ordered = Vec::new();
        for site in scopes.clone() {
            ordered.push(self.keys.key(model, Some(id), site));
            if let Some(extra) = extra {
                ordered.extend(extra.extra_keys(&self.keys, site));
            }
        }

        let slug = item.cache_slug();
        if !slug.is_empty() {
            for site in scopes {
                ordered.push(self.keys.slug_key(model, slug, site));
            }
        }

        let mut seen = HashSet::new();
        ordered.retain(|key| seen.insert(key.clone()));
        ordered
    }
}

impl CacheIdentity for ArticleRecord {
    fn cache_model(&self) -> &'static str {
        ContentModel::Article.name()
    }

    fn cache_id(&self) -> i64 {
        self.id
    }

    fn cache_slug(&self) -> &str {
        &self.slug
    }

    fn extra_invalidation(&self) -> Option<&dyn Invalidatable> {
        Some(self)
    }
}

impl Invalidatable for ArticleRecord {
    fn extra_keys(&self, keys: &CacheKeyFormatter, site: Option<SiteId>) -> Vec<String> {
        let primary = keys.key(self.cache_model(), Some(self.id), site);
        vec![
            keys.derived_key(&primary, "categories"),
            keys.html_key(&primary),
        ]
    }
}

pub const IMAGE_MODEL: &str = "image";

impl CacheIdentity for ImageRecord {
    fn cache_model(&self) -> &'static str {
        IMAGE_MODEL
    }

    fn cache_id(&self) -> i64 {
        self.id
    }

    fn cache_slug(&self) -> &str {
        &self.slug
    }

}
