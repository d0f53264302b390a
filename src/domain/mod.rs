//! Domain layer types and invariants.

pub mod articles;
pub mod categories;
pub mod content_types;
pub mod entities;
pub mod error;
pub mod images;
pub mod permalink;
pub mod slug;
pub mod types;
