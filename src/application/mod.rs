//! Application services layer.

pub mod content_types;
pub mod detail;
pub mod editorial;
pub mod error;
pub mod repos;
pub mod staff;
