//! Namespaced response cache.
//!
//! This module provides the storage side of the router:
//! - Named namespaces holding request-key → response snapshots
//! - Creation-ordered lookup across every namespace
//! - Whole-namespace deletion for version rotation
//! - In-memory and SQLite backends behind one trait

mod key;
mod storage;
mod traits;

pub use key::CacheKey;
pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{CacheResult, CacheStorage, CachedEntry, ResponseSource};
