//! penlog: a blog content service with a TTL-keyed read-through cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
