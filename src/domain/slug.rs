//! Utilities for generating deterministic, human-friendly slugs.
//!
//! Slugs show up in three places: article and image URLs, category slugs
//! derived from materialized paths, and the model segment of cache keys.
//! All of them go through the `slug` crate so non-ASCII input is
//! transliterated the same way everywhere.

use slug::slugify;
use thiserror::Error;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{slug}` is not a valid slug: use letters, numbers, hyphens or underscores")]
    Invalid { slug: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Resolve the slug for a content object about to be saved.
///
/// An explicit slug is lowercased and must already be URL-safe; a missing slug
/// is derived from the title.
pub fn resolve_content_slug(explicit: Option<&str>, title: &str) -> Result<String, SlugError> {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let slug = value.to_ascii_lowercase();
            if is_valid_slug(&slug) {
                Ok(slug)
            } else {
                Err(SlugError::Invalid {
                    slug: value.to_string(),
                })
            }
        }
        None => derive_slug(title),
    }
}

/// Slugs appear verbatim in permalinks: `[a-z0-9_-]+`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
