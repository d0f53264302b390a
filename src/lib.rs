//! Broadsheet: a multi-site content server with a disposable object and page
//! cache in front of Postgres.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
