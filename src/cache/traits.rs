//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

use super::key::CacheKey;
use crate::error::Result;
use crate::http::Response;
use crate::router::Strategy;

/// A stored response together with the request it answers.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub key: CacheKey,
  pub response: Response,
  /// When the entry was written (existence only, never used for expiry)
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// A backend holds any number of named namespaces. Namespaces remember their
/// creation order; [`CacheStorage::match_any`] searches them oldest first.
/// Every method is atomic with respect to the others.
pub trait CacheStorage: Send + Sync {
  /// Create the namespace if it does not exist yet.
  fn open(&self, namespace: &str) -> Result<()>;

  /// Names of all namespaces in creation order.
  fn namespaces(&self) -> Result<Vec<String>>;

  /// Delete a namespace with all its entries. Returns whether it existed.
  fn delete(&self, namespace: &str) -> Result<bool>;

  /// Look up an entry in a single namespace.
  fn get(&self, namespace: &str, key: &CacheKey) -> Result<Option<CachedEntry>>;

  /// Look up an entry in every namespace, oldest namespace first.
  fn match_any(&self, key: &CacheKey) -> Result<Option<CachedEntry>>;

  /// Insert or replace an entry, creating the namespace when needed.
  fn put(&self, namespace: &str, key: &CacheKey, response: &Response) -> Result<()>;

  /// Insert or replace several entries at once; either all land or none do.
  fn put_all(&self, namespace: &str, entries: &[(CacheKey, Response)]) -> Result<()>;

  /// Number of entries in a namespace (0 if it does not exist).
  fn len(&self, namespace: &str) -> Result<usize>;
}

/// Result from routing a request, including the response and where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: ResponseSource,
  /// Strategy that served the request, `None` for pass-through
  pub strategy: Option<Strategy>,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T, strategy: Strategy) -> Self {
    Self {
      data,
      source: ResponseSource::Network,
      strategy: Some(strategy),
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, strategy: Strategy, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: ResponseSource::Cache,
      strategy: Some(strategy),
      cached_at: Some(cached_at),
    }
  }

  /// A generated stand-in because both cache and network failed.
  pub fn fallback(data: T, strategy: Strategy) -> Self {
    Self {
      data,
      source: ResponseSource::Fallback,
      strategy: Some(strategy),
      cached_at: None,
    }
  }

  /// The request was not intercepted.
  pub fn passthrough(data: T) -> Self {
    Self {
      data,
      source: ResponseSource::Passthrough,
      strategy: None,
      cached_at: None,
    }
  }
}

/// Indicates where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh data from network
  Network,
  /// Served from a cache namespace
  Cache,
  /// Generated offline page or placeholder image
  Fallback,
  /// Not intercepted; straight from the network
  Passthrough,
}

impl std::fmt::Display for ResponseSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Network => "network",
      Self::Cache => "cache",
      Self::Fallback => "fallback",
      Self::Passthrough => "passthrough",
    };
    f.write_str(name)
  }
}
