//! HTML rendering for public pages.

pub mod views;
