//! Materialized-path category tree.
//!
//! Every node stores its full path as fixed-width base-36 steps, so a node's
//! ancestors are exactly the proper prefixes of its path and sorting by path
//! yields a depth-first ordering.

use std::collections::BTreeSet;

use slug::slugify;

use crate::domain::error::DomainError;

pub const STEP_LEN: usize = 4;
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_PATH_LEN: usize = 1024;

pub fn depth_of(path: &str) -> i32 {
    (path.len() / STEP_LEN) as i32
}

/// Category slugs mirror the node path.
pub fn category_slug(path: &str) -> String {
    slugify(path)
}

/// Path of the next child below `parent` (or the next root when `parent` is
/// `None`), given the path of its current last child.
pub fn next_child_path(parent: Option<&str>, last_sibling: Option<&str>) -> Result<String, DomainError> {
    let prefix = parent.unwrap_or("");
    let step = match last_sibling {
        Some(sibling) => {
            let step = sibling
                .strip_prefix(prefix)
                .filter(|step| step.len() == STEP_LEN)
                .ok_or_else(|| {
                    DomainError::invariant(format!(
                        "sibling path `{sibling}` is not a direct child of `{prefix}`"
                    ))
                })?;
            increment_step(step)?
        }
        None => encode_step(1),
    };

    let path = format!("{prefix}{step}");
    if path.len() > MAX_PATH_LEN {
        return Err(DomainError::validation("category tree is too deep"));
    }
    Ok(path)
}

/// The path itself plus every ancestor path.
pub fn lineage(path: &str) -> Vec<String> {
    (1..=path.len() / STEP_LEN)
        .map(|depth| path[..depth * STEP_LEN].to_string())
        .collect()
}

/// Union of the lineages of `paths`, deduplicated and ordered by path.
pub fn expand_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut expanded = BTreeSet::new();
    for path in paths {
        expanded.extend(lineage(path));
    }
    expanded.into_iter().collect()
}

fn increment_step(step: &str) -> Result<String, DomainError> {
    let value = u64::from_str_radix(step, 36)
        .map_err(|_| DomainError::invariant(format!("invalid path step `{step}`")))?;
    let next = value + 1;
    if next >= 36u64.pow(STEP_LEN as u32) {
        return Err(DomainError::validation("category has too many children"));
    }
    Ok(encode_step(next))
}

fn encode_step(mut value: u64) -> String {
    let mut buf = [b'0'; STEP_LEN];
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    buf.iter().map(|&b| b as char).collect()
}
