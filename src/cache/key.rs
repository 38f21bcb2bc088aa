//! Normalized request identity used as the cache key.

use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

use crate::http::Request;

/// Method plus absolute URL, fragment removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  method: Method,
  url: Url,
}

impl CacheKey {
  pub fn new(method: Method, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self { method, url }
  }

  pub fn for_request(request: &Request) -> Self {
    Self::new(request.method.clone(), &request.url)
  }

  /// Key for a plain GET of the given URL.
  pub fn get(url: &Url) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn method(&self) -> &Method {
    &self.method
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  /// Human-readable form, e.g. `GET https://cards.test/static/app.js`.
  pub fn description(&self) -> String {
    format!("{} {}", self.method, self.url)
  }

  /// Stable, fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.description().as_bytes());
    hex::encode(hasher.finalize())
  }
}
