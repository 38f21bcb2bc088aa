//! Error types for the cache router.

use thiserror::Error;

/// Errors that can occur while routing, caching or installing.
#[derive(Error, Debug)]
pub enum Error {
  /// The network could not produce a response (connection, DNS, timeout).
  #[error("Network request to {url} failed: {reason}")]
  Network { url: String, reason: String },

  /// A manifest URL could not be fetched during install.
  ///
  /// Non-OK statuses count as failures here, matching all-or-nothing
  /// pre-caching.
  #[error("Failed to pre-cache {url}: {reason}")]
  ManifestFetch { url: String, reason: String },

  /// Cache database error.
  #[error("Cache storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  /// Stored headers or a control message could not be (de)serialized.
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A URL could not be parsed or resolved against the origin.
  #[error("Invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),

  /// A control message was malformed.
  #[error("Invalid control message: {0}")]
  InvalidMessage(String),

  /// A storage mutex was poisoned by a panicking writer.
  #[error("Lock poisoned: {0}")]
  LockPoisoned(String),

  /// I/O error while preparing on-disk storage.
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Build a network failure for the given URL.
  pub fn network(url: impl ToString, reason: impl ToString) -> Self {
    Self::Network {
      url: url.to_string(),
      reason: reason.to_string(),
    }
  }

  /// Whether this error is a network failure that a strategy may recover from.
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. })
  }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
  fn from(e: std::sync::PoisonError<T>) -> Self {
    Self::LockPoisoned(e.to_string())
  }
}

/// A specialized `Result` type for cache router operations.
pub type Result<T> = std::result::Result<T, Error>;
