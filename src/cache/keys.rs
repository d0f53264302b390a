//! Cache key construction.
//!
//! Keys are plain strings of `::`-separated segments. Optional segments carry a
//! tag (`slug`, `v`, `s`) so that omitting one can never make two different
//! inputs spell the same key.

use crate::config::CacheSettings;
use crate::domain::types::SiteId;

/// Builds deterministic cache keys from the configured namespace and version.
///
/// Bumping the version makes every previously written key unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyFormatter {
    namespace: String,
    version: String,
}

impl CacheKeyFormatter {
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.namespace.clone(), settings.version.clone())
    }

    /// Primary key for a model, optionally narrowed to one object and one site.
    pub fn key(&self, model: &str, id: Option<i64>, site: Option<SiteId>) -> String {
        let mut key = format!("{}::{}", self.namespace, model_segment(model));
        if let Some(id) = id {
            key.push_str(&format!("::{id}"));
        }
        self.finish(key, site)
    }

    /// Slug indirection key; the cached value is the primary key.
    pub fn slug_key(&self, model: &str, slug: &str, site: Option<SiteId>) -> String {
        let key = format!(
            "{}::{}::slug::{slug}",
            self.namespace,
            model_segment(model)
        );
        self.finish(key, site)
    }

    pub fn content_type_key(&self, code: &str) -> String {
        format!(
            "{}::contenttype::{}::v{}",
            self.namespace,
            code.to_ascii_lowercase(),
            self.version
        )
    }

    /// Whole-page key derived from a primary key.
    pub fn html_key(&self, primary: &str) -> String {
        format!("{primary}.html")
    }

    /// Key for data derived from one object, such as its expanded categories.
    pub fn derived_key(&self, primary: &str, suffix: &str) -> String {
        format!("{primary}::{suffix}")
    }

    fn finish(&self, mut key: String, site: Option<SiteId>) -> String {
        key.push_str(&format!("::v{}", self.version));
        if let Some(site) = site {
            key.push_str(&format!("::s{site}"));
        }
        key
    }
}

fn model_segment(model: &str) -> String {
    slug::slugify(model)
}
