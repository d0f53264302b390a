//! Typed JSON entries on top of a raw byte backend.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};

use super::backend::{CacheBackend, CacheError};

#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    long_ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, long_ttl: Duration) -> Self {
        Self { backend, long_ttl }
    }

    pub fn long_ttl(&self) -> Duration {
        self.long_ttl
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.backend.get(key).await.inspect_err(|_| record_error("get"))? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| {
                record_error("decode");
                CacheError::Decode {
                    key: key.to_string(),
                    source,
                }
            })
    }

    /// Store with the long ttl.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        self.set_json_with_ttl(key, value, self.long_ttl).await
    }

    pub async fn set_json_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_vec(value).map_err(|source| {
            record_error("encode");
            CacheError::Encode {
                key: key.to_string(),
                source,
            }
        })?;
        self.backend
            .set(key, Bytes::from(encoded), ttl)
            .await
            .inspect_err(|_| record_error("set"))
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.backend
            .delete(key)
            .await
            .inspect_err(|_| record_error("delete"))
    }
}

fn record_error(op: &'static str) {
    counter!("broadsheet_cache_error_total", "op" => op).increment(1);
}
