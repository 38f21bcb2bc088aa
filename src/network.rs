//! Network access behind a trait so the router can be driven without a real network.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Something that can turn a request into a response over the network.
///
/// Implementations return `Err(Error::Network { .. })` only when no response
/// was obtained. HTTP error statuses are ordinary responses.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetcherOptions {
  /// Per-request deadline; none by default
  pub timeout: Option<Duration>,
  pub user_agent: Option<String>,
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(options: &HttpFetcherOptions) -> Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = options.timeout {
      builder = builder.timeout(timeout);
    }
    if let Some(agent) = &options.user_agent {
      builder = builder.user_agent(agent.clone());
    }

    let client = builder
      .build()
      .map_err(|e| Error::network("<client>", format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    debug!("{} {}", request.method, request.url);

    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(|e| Error::network(&request.url, e))?;

    let status = response.status().as_u16();
    let headers = header_pairs(response.headers());

    let body = response
      .bytes()
      .await
      .map_err(|e| Error::network(&request.url, e))?;

    Ok(Response::new(status, headers, body))
  }
}

/// Snapshot response headers; values that are not valid UTF-8 are decoded lossily.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
  headers
    .iter()
    .map(|(name, value)| {
      (
        name.as_str().to_string(),
        String::from_utf8_lossy(value.as_bytes()).into_owned(),
      )
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::header::{HeaderValue, CONTENT_TYPE};

  #[test]
  fn test_header_pairs_keeps_non_utf8_values() {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
    headers.insert(
      "content-disposition",
      HeaderValue::from_bytes(b"inline; filename=caf\xe9.html").unwrap(),
    );

    let pairs = header_pairs(&headers);
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&("content-type".to_string(), "text/html".to_string())));
    assert!(pairs.contains(&(
      "content-disposition".to_string(),
      "inline; filename=caf\u{fffd}.html".to_string()
    )));
  }
}

#[cfg(test)]
pub(crate) mod mock {
  //! Scriptable fetcher for router tests.

  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use tokio::sync::Semaphore;

  /// Answers from a URL → response table; unknown URLs or an offline flag
  /// produce network errors. Optionally blocks every fetch until released.
  #[derive(Clone, Default)]
  pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, Response>>>,
    offline: Arc<Mutex<bool>>,
    calls: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
  }

  impl MockFetcher {
    pub fn new() -> Self {
      Self::default()
    }

    /// Every fetch waits for a permit from [`MockFetcher::release`].
    pub fn gated() -> Self {
      Self {
        gate: Some(Arc::new(Semaphore::new(0))),
        ..Self::default()
      }
    }

    pub fn route(&self, url: &str, response: Response) {
      self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
      *self.offline.lock().unwrap() = offline;
    }

    pub fn release(&self, permits: usize) {
      if let Some(gate) = &self.gate {
        gate.add_permits(permits);
      }
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
      self.calls.fetch_add(1, Ordering::SeqCst);

      if let Some(gate) = &self.gate {
        gate.acquire().await.unwrap().forget();
      }

      if *self.offline.lock().unwrap() {
        return Err(Error::network(&request.url, "offline"));
      }

      self
        .routes
        .lock()
        .unwrap()
        .get(request.url.as_str())
        .cloned()
        .ok_or_else(|| Error::network(&request.url, "connection refused"))
    }
  }
}
