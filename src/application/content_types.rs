use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::application::repos::{ContentTypesRepo, RepoError};
use crate::cache::{CacheKeyFormatter, CacheStore};
use crate::domain::content_types::{ContentModel, UnknownModel};
use crate::domain::entities::ContentTypeRecord;

#[derive(Debug, Error)]
pub enum ContentTypeError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    UnknownModel(#[from] UnknownModel),
}

/// A content type matched by a URL code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContentType {
    pub model: ContentModel,
    /// Stored code, lowercased; canonical URLs use this rather than the
    /// requested spelling.
    pub short_name: String,
}

/// Maps two-character URL codes to renderable models.
///
/// The matched content type row is cached with the long ttl; the store is
/// consulted on a miss.
#[derive(Clone)]
pub struct ContentTypeResolver {
    repo: Arc<dyn ContentTypesRepo>,
    store: CacheStore,
    keys: CacheKeyFormatter,
}

impl ContentTypeResolver {
    pub fn new(repo: Arc<dyn ContentTypesRepo>, store: CacheStore, keys: CacheKeyFormatter) -> Self {
        Self { repo, store, keys }
    }

    /// `Ok(None)` when no content type uses `code`. A content type whose model
    /// is not registered is an error.
    pub async fn resolve(
        &self,
        code: &str,
    ) -> Result<Option<ResolvedContentType>, ContentTypeError> {
        let key = self.keys.content_type_key(code);

        let cached = match self.store.get_json::<ContentTypeRecord>(&key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    target = "broadsheet::cache",
                    code,
                    error = %err,
                    "content type cache lookup failed; treating as miss"
                );
                None
            }
        };

        let record = match cached {
            Some(record) => {
                counter!("broadsheet_cache_hit_total", "layer" => "content_type").increment(1);
                record
            }
            None => {
                counter!("broadsheet_cache_miss_total", "layer" => "content_type").increment(1);
                let Some(record) = self.repo.find_by_short_name(code).await? else {
                    return Ok(None);
                };
                if let Err(err) = self.store.set_json(&key, &record).await {
                    warn!(
                        target = "broadsheet::cache",
                        code,
                        error = %err,
                        "content type cache write failed"
                    );
                }
                record
            }
        };

        Ok(Some(ResolvedContentType {
            model: ContentModel::from_model_name(&record.model_name)?,
            short_name: record.short_name.to_ascii_lowercase(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCacheBackend;
    use crate::domain::entities::ContentTypeRecord;

    struct CountingTypes {
        records: Vec<ContentTypeRecord>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ContentTypesRepo for CountingTypes {
        async fn find_by_short_name(
            &self,
            code: &str,
        ) -> Result<Option<ContentTypeRecord>, RepoError> {
            *self.calls.lock().expect("calls") += 1;
            Ok(self
                .records
                .iter()
                .find(|r| r.short_name.eq_ignore_ascii_case(code))
                .cloned())
        }
    }

    fn resolver(records: Vec<ContentTypeRecord>) -> (Arc<CountingTypes>, ContentTypeResolver) {
        let repo = Arc::new(CountingTypes {
            records,
            calls: Mutex::new(0),
        });
        let backend = Arc::new(MemoryCacheBackend::new(
            NonZeroUsize::new(8).expect("non-zero"),
        ));
        let store = CacheStore::new(backend, Duration::from_secs(60));
        let resolver =
            ContentTypeResolver::new(repo.clone(), store, CacheKeyFormatter::new("t", "1"));
        (repo, resolver)
    }

    fn record(model_name: &str, short_name: &str) -> ContentTypeRecord {
        ContentTypeRecord {
            id: 1,
            full_name: model_name.to_string(),
            model_name: model_name.to_string(),
            short_name: short_name.to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_and_caches_known_code() {
        let (repo, resolver) = resolver(vec![record("article", "ar")]);

        let expected = Some(ResolvedContentType {
            model: ContentModel::Article,
            short_name: "ar".to_string(),
        });
        assert_eq!(resolver.resolve("ar").await.expect("resolve"), expected);
        assert_eq!(resolver.resolve("AR").await.expect("resolve"), expected);
        assert_eq!(*repo.calls.lock().expect("calls"), 1);
    }

    #[tokio::test]
    async fn short_name_comes_from_the_stored_row() {
        let (_, resolver) = resolver(vec![record("article", "Ar")]);
        let resolved = resolver.resolve("aR").await.expect("resolve").expect("known");
        assert_eq!(resolved.short_name, "ar");
    }

    #[tokio::test]
    async fn unknown_code_is_none() {
        let (_, resolver) = resolver(vec![record("article", "ar")]);
        assert_eq!(resolver.resolve("zz").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn unregistered_model_is_an_error() {
        let (_, resolver) = resolver(vec![record("poll", "po")]);
        let err = resolver.resolve("po").await.expect_err("unknown model");
        assert!(matches!(err, ContentTypeError::UnknownModel(_)));
    }
}
