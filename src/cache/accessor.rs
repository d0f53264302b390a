//! Read-through helpers for cached content objects.

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::domain::types::SiteId;

use super::backend::CacheError;
use super::invalidation::CacheIdentity;
use super::keys::CacheKeyFormatter;
use super::store::CacheStore;

/// Ways of addressing a cached object. When several are set the explicit key
/// wins, then the slug, then the id.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lookup<'a> {
    pub id: Option<i64>,
    pub slug: Option<&'a str>,
    pub cache_key: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_slug(slug: &'a str) -> Self {
        Self {
            slug: Some(slug),
            ..Self::default()
        }
    }
}

/// Cache accessor for one content model on one site.
#[derive(Clone)]
pub struct ContentCache {
    store: CacheStore,
    keys: CacheKeyFormatter,
}

impl ContentCache {
    pub fn new(store: CacheStore, keys: CacheKeyFormatter) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &CacheKeyFormatter {
        &self.keys
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Look up a cached object. A slug lookup reads the indirection entry and
    /// then the primary entry; either one missing is a miss.
    pub async fn try_get<T: DeserializeOwned>(
        &self,
        model: &str,
        site: Option<SiteId>,
        lookup: Lookup<'_>,
    ) -> Result<Option<T>, CacheError> {
        let found = if let Some(key) = lookup.cache_key {
            self.store.get_json(key).await?
        } else if let Some(slug) = lookup.slug {
            let slug_key = self.keys.slug_key(model, slug, site);
            match self.store.get_json::<String>(&slug_key).await? {
                Some(primary) => self.store.get_json(&primary).await?,
                None => None,
            }
        } else if let Some(id) = lookup.id {
            let key = self.keys.key(model, Some(id), site);
            self.store.get_json(&key).await?
        } else {
            None
        };

        let outcome = if found.is_some() {
            "broadsheet_cache_hit_total"
        } else {
            "broadsheet_cache_miss_total"
        };
        counter!(outcome, "layer" => "object").increment(1);
        Ok(found)
    }

    /// Like [`ContentCache::try_get`] but a backend failure is logged and
    /// reported as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        model: &str,
        site: Option<SiteId>,
        lookup: Lookup<'_>,
    ) -> Option<T> {
        match self.try_get(model, site, lookup).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    target = "broadsheet::cache",
                    model,
                    error = %err,
                    "cache lookup failed; treating as miss"
                );
                None
            }
        }
    }

    /// Write the primary entry and the slug indirection entry.
    pub async fn populate<T>(&self, item: &T, site: Option<SiteId>) -> Result<(), CacheError>
    where
        T: CacheIdentity + Serialize,
    {
        let primary = self
            .keys
            .key(item.cache_model(), Some(item.cache_id()), site);
        self.store.set_json(&primary, item).await?;

        let slug = item.cache_slug();
        if !slug.is_empty() {
            let slug_key = self.keys.slug_key(item.cache_model(), slug, site);
            self.store.set_json(&slug_key, &primary).await?;
        }
        Ok(())
    }

    /// Drop the primary, whole-page, derived and slug entries of `item` for one
    /// site. Every key is attempted; the first failure is returned.
    pub async fn purge<T: CacheIdentity + ?Sized>(
        &self,
        item: &T,
        site: Option<SiteId>,
    ) -> Result<(), CacheError> {
        let primary = self
            .keys
            .key(item.cache_model(), Some(item.cache_id()), site);
        let mut targets = vec![primary.clone(), self.keys.html_key(&primary)];
        if let Some(extra) = item.extra_invalidation() {
            for key in extra.extra_keys(&self.keys, site) {
                if !targets.contains(&key) {
                    targets.push(key);
                }
            }
        }
        let slug = item.cache_slug();
        if !slug.is_empty() {
            targets.push(self.keys.slug_key(item.cache_model(), slug, site));
        }

        let mut first_error = None;
        for key in targets {
            if let Err(err) = self.store.delete(&key).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use serde::Deserialize;

    use super::*;
    use crate::cache::Invalidatable;
    use crate::cache::memory::MemoryCacheBackend;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Story {
        id: i64,
        slug: String,
    }

    impl CacheIdentity for Story {
        fn cache_model(&self) -> &'static str {
            "story"
        }

        fn cache_id(&self) -> i64 {
            self.id
        }

        fn cache_slug(&self) -> &str {
            &self.slug
        }
    }

    /// A story that also caches its tag list.
    #[derive(Debug, Clone, Serialize)]
    struct TaggedStory(Story);

    impl CacheIdentity for TaggedStory {
        fn cache_model(&self) -> &'static str {
            "story"
        }

        fn cache_id(&self) -> i64 {
            self.0.id
        }

        fn cache_slug(&self) -> &str {
            &self.0.slug
        }

        fn extra_invalidation(&self) -> Option<&dyn Invalidatable> {
            Some(self)
        }
    }

    impl Invalidatable for TaggedStory {
        fn extra_keys(&self, keys: &CacheKeyFormatter, site: Option<SiteId>) -> Vec<String> {
            let primary = keys.key("story", Some(self.0.id), site);
            vec![keys.derived_key(&primary, "tags")]
        }
    }

    fn cache() -> (Arc<MemoryCacheBackend>, ContentCache) {
        let backend = Arc::new(MemoryCacheBackend::new(
            NonZeroUsize::new(32).expect("non-zero"),
        ));
        let store = CacheStore::new(backend.clone(), Duration::from_secs(60));
        (
            backend,
            ContentCache::new(store, CacheKeyFormatter::new("test", "1")),
        )
    }

    fn story(id: i64, slug: &str) -> Story {
        Story {
            id,
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn populated_object_is_found_by_id_and_slug() {
        let (_, cache) = cache();
        let item = story(4, "dock-strike");
        cache.populate(&item, Some(1)).await.expect("populate");

        let by_id: Option<Story> = cache.get("story", Some(1), Lookup::by_id(4)).await;
        let by_slug: Option<Story> = cache
            .get("story", Some(1), Lookup::by_slug("dock-strike"))
            .await;
        assert_eq!(by_id, Some(item.clone()));
        assert_eq!(by_slug, Some(item));

        let other_site: Option<Story> = cache.get("story", Some(2), Lookup::by_id(4)).await;
        assert_eq!(other_site, None);
    }

    #[tokio::test]
    async fn explicit_key_beats_slug_and_id() {
        let (_, cache) = cache();
        let first = story(1, "first");
        let second = story(2, "second");
        cache.populate(&first, None).await.expect("first");
        cache.populate(&second, None).await.expect("second");

        let key = cache.keys().key("story", Some(2), None);
        let found: Option<Story> = cache
            .get(
                "story",
                None,
                Lookup {
                    id: Some(1),
                    slug: Some("first"),
                    cache_key: Some(&key),
                },
            )
            .await;
        assert_eq!(found, Some(second));
    }

    #[tokio::test]
    async fn slug_beats_id() {
        let (_, cache) = cache();
        cache.populate(&story(1, "first"), None).await.expect("first");
        cache.populate(&story(2, "second"), None).await.expect("second");

        let found: Option<Story> = cache
            .get(
                "story",
                None,
                Lookup {
                    id: Some(1),
                    slug: Some("second"),
                    cache_key: None,
                },
            )
            .await;
        assert_eq!(found.map(|s| s.id), Some(2));
    }

    #[tokio::test]
    async fn dangling_slug_entry_is_a_clean_miss() {
        let (backend, cache) = cache();
        let item = story(9, "gone");
        cache.populate(&item, None).await.expect("populate");
        let primary = cache.keys().key("story", Some(9), None);
        crate::cache::CacheBackend::delete(backend.as_ref(), &primary)
            .await
            .expect("delete");

        let found: Option<Story> = cache.get("story", None, Lookup::by_slug("gone")).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn empty_lookup_misses() {
        let (_, cache) = cache();
        let found: Option<Story> = cache.get("story", None, Lookup::default()).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn purge_drops_primary_slug_and_page() {
        let (backend, cache) = cache();
        let item = story(5, "five");
        cache.populate(&item, Some(1)).await.expect("populate");
        let primary = cache.keys().key("story", Some(5), Some(1));
        cache
            .store()
            .set_json(&cache.keys().html_key(&primary), "<p>five</p>")
            .await
            .expect("page");
        assert_eq!(backend.len(), 3);

        cache.purge(&item, Some(1)).await.expect("purge");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn purge_drops_derived_entries() {
        let (backend, cache) = cache();
        let item = TaggedStory(story(6, "six"));
        cache.populate(&item, Some(1)).await.expect("populate");
        let primary = cache.keys().key("story", Some(6), Some(1));
        let tags = cache.keys().derived_key(&primary, "tags");
        cache
            .store()
            .set_json(&tags, &["port", "weather"])
            .await
            .expect("tags");

        cache.purge(&item, Some(1)).await.expect("purge");
        assert!(!backend.contains(&tags));
        assert!(backend.is_empty());
    }
}
