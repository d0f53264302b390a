//! Content cache.
//!
//! Cached entries are derived, disposable copies of stored content. The store
//! stays authoritative: any failed or missing entry only costs a query.
//!
//! - [`CacheKeyFormatter`] builds namespaced, versioned keys.
//! - [`CacheBackend`] is the key-value seam; [`MemoryCacheBackend`] is the
//!   in-process implementation.
//! - [`ContentCache`] reads and populates object entries.
//! - [`CacheInvalidator`] drops entries after writes.

mod accessor;
mod backend;
mod invalidation;
mod keys;
mod lock;
mod memory;
mod store;

pub use accessor::{ContentCache, Lookup};
pub use backend::{CacheBackend, CacheError};
pub use invalidation::{
    CacheIdentity, CacheInvalidator, IMAGE_MODEL, Invalidatable, InvalidationFailure,
    InvalidationReport,
};
pub use keys::CacheKeyFormatter;
pub use memory::MemoryCacheBackend;
pub use store::CacheStore;
