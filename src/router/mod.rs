//! Request router that serves intercepted requests through caching strategies.
//!
//! The router sits between the application and the network:
//! - Classifies each GET request with a [`RoutePolicy`]
//! - Serves it cache-first, network-first or stale-while-revalidate
//! - Falls back to a generated offline page or placeholder image
//! - Pre-caches a manifest on install and rotates namespaces on activate

mod fallback;
mod lifecycle;
mod messages;
mod policy;

pub use fallback::{fallback_image, offline_page};
pub use lifecycle::WorkerState;
pub use messages::{ControlMessage, MessageOutcome};
pub use policy::{Route, RoutePolicy, Scope, Strategy};

use futures::future::try_join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheKey, CacheResult, CacheStorage};
use crate::error::{Error, Result};
use crate::http::{Destination, Request, Response};
use crate::network::Fetcher;
use lifecycle::Lifecycle;

/// Settings the router is built from.
#[derive(Debug, Clone)]
pub struct RouterOptions {
  /// The application's own origin; relative manifest URLs resolve against it
  pub origin: Url,
  pub static_namespace: String,
  pub dynamic_namespace: String,
  /// URLs pre-cached on install, relative or absolute
  pub manifest: Vec<String>,
  /// Cross-origin hosts whose requests are intercepted
  pub external_hosts: Vec<String>,
  /// Activate right after a successful install
  pub skip_waiting: bool,
  /// Intercepted requests slower than this are logged
  pub slow_request_threshold: Duration,
}

/// Routes requests between the caller, the cache namespaces and the network.
pub struct CacheRouter<S: CacheStorage, F: Fetcher> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  policy: Arc<RoutePolicy>,
  scope: Scope,
  origin: Url,
  static_namespace: String,
  dynamic_namespace: String,
  manifest: Vec<String>,
  slow_request_threshold: Duration,
  lifecycle: Arc<Mutex<Lifecycle>>,
  /// Number of revalidations still running after their response was returned
  background: Arc<watch::Sender<usize>>,
}

impl<S: CacheStorage + 'static, F: Fetcher> CacheRouter<S, F> {
  pub fn new(storage: S, fetcher: F, options: RouterOptions) -> Self {
    Self {
      storage: Arc::new(storage),
      fetcher: Arc::new(fetcher),
      policy: Arc::new(RoutePolicy::default()),
      scope: Scope::new(&options.origin, options.external_hosts),
      origin: options.origin,
      static_namespace: options.static_namespace,
      dynamic_namespace: options.dynamic_namespace,
      manifest: options.manifest,
      slow_request_threshold: options.slow_request_threshold,
      lifecycle: Arc::new(Mutex::new(Lifecycle::new(options.skip_waiting))),
      background: Arc::new(watch::Sender::new(0)),
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn policy(&self) -> &RoutePolicy {
    &self.policy
  }

  pub fn static_namespace(&self) -> &str {
    &self.static_namespace
  }

  pub fn dynamic_namespace(&self) -> &str {
    &self.dynamic_namespace
  }

  pub fn state(&self) -> WorkerState {
    self.lifecycle().state()
  }

  fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
    self.lifecycle.lock().unwrap_or_else(|p| p.into_inner())
  }

  /// Resolve a possibly relative URL against the origin.
  pub fn resolve(&self, url: &str) -> Result<Url> {
    Ok(self.origin.join(url)?)
  }

  // ==========================================================================
  // Request handling
  // ==========================================================================

  /// Serve a request.
  ///
  /// Non-GET requests and requests outside the scope go straight to the
  /// network. Everything else is classified and served by its strategy.
  pub async fn handle(&self, request: &Request) -> Result<CacheResult<Response>> {
    if !request.is_get() || !self.scope.contains(&request.url) {
      debug!("Passing through {} {}", request.method, request.url);
      let response = self.fetcher.fetch(request).await?;
      return Ok(CacheResult::passthrough(response));
    }

    let strategy = self.policy.classify(&request.url);
    debug!("{} {} -> {}", request.method, request.url, strategy);

    let started = Instant::now();
    let result = match strategy {
      Strategy::CacheFirst => self.cache_first(request).await,
      Strategy::NetworkFirst => self.network_first(request).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
    };

    let elapsed = started.elapsed();
    if elapsed > self.slow_request_threshold {
      warn!(
        "Slow request detected: {} ({}ms)",
        request.url,
        elapsed.as_millis()
      );
    }

    result
  }

  /// Serve from any namespace; fetch and store in the static namespace on miss.
  async fn cache_first(&self, request: &Request) -> Result<CacheResult<Response>> {
    let key = CacheKey::for_request(request);

    if let Some(entry) = self.storage.match_any(&key)? {
      return Ok(CacheResult::from_cache(
        entry.response,
        Strategy::CacheFirst,
        entry.cached_at,
      ));
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_ok() {
          store(&*self.storage, &self.static_namespace, &key, &response);
        }
        Ok(CacheResult::from_network(response, Strategy::CacheFirst))
      }
      Err(e) if e.is_network() && request.destination == Destination::Image => {
        debug!("Cache miss and network failed for {}: {}", request.url, e);
        Ok(CacheResult::fallback(fallback_image(), Strategy::CacheFirst))
      }
      Err(e) => Err(e),
    }
  }

  /// Try the network, store in the dynamic namespace, fall back to any cached copy.
  async fn network_first(&self, request: &Request) -> Result<CacheResult<Response>> {
    let key = CacheKey::for_request(request);

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_ok() {
          store(&*self.storage, &self.dynamic_namespace, &key, &response);
        }
        Ok(CacheResult::from_network(response, Strategy::NetworkFirst))
      }
      Err(e) if e.is_network() => {
        debug!("Network failed for {}, trying cache: {}", request.url, e);

        if let Some(entry) = self.storage.match_any(&key)? {
          return Ok(CacheResult::from_cache(
            entry.response,
            Strategy::NetworkFirst,
            entry.cached_at,
          ));
        }

        if request.navigate {
          return Ok(CacheResult::fallback(offline_page(), Strategy::NetworkFirst));
        }

        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  /// Return the dynamic-namespace copy at once while refreshing it in the background.
  async fn stale_while_revalidate(&self, request: &Request) -> Result<CacheResult<Response>> {
    let key = CacheKey::for_request(request);
    self.storage.open(&self.dynamic_namespace)?;

    let revalidation = revalidate(
      Arc::clone(&self.storage),
      Arc::clone(&self.fetcher),
      self.dynamic_namespace.clone(),
      key.clone(),
      request.clone(),
    );

    match self.storage.get(&self.dynamic_namespace, &key)? {
      Some(entry) => {
        let url = request.url.clone();
        self.spawn_background(async move {
          if let Err(e) = revalidation.await {
            debug!("Network failed during revalidate of {}: {}", url, e);
          }
        });

        Ok(CacheResult::from_cache(
          entry.response,
          Strategy::StaleWhileRevalidate,
          entry.cached_at,
        ))
      }
      None => {
        let response = revalidation.await?;
        Ok(CacheResult::from_network(
          response,
          Strategy::StaleWhileRevalidate,
        ))
      }
    }
  }

  /// Spawn a detached task counted as in flight until it finishes or panics.
  ///
  /// The task is not owned by the router, so dropping the router or a
  /// pending [`CacheRouter::settle`] never cancels it.
  fn spawn_background<Fut>(&self, task: Fut)
  where
    Fut: std::future::Future<Output = ()> + Send + 'static,
  {
    let in_flight = InFlight::enter(Arc::clone(&self.background));
    tokio::spawn(async move {
      let _in_flight = in_flight;
      task.await;
    });
  }

  /// Wait until every background revalidation has finished.
  ///
  /// Safe to cancel: the revalidations keep running and a later call waits
  /// for them again.
  pub async fn settle(&self) {
    let mut in_flight = self.background.subscribe();
    // The sender lives in `self`, so the channel cannot close while we wait
    let _ = in_flight.wait_for(|count| *count == 0).await;
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Resume as installed when an earlier process already filled the static namespace.
  ///
  /// Only a router still in [`WorkerState::Parsed`] is affected. Returns the
  /// resulting state.
  pub fn restore(&self) -> Result<WorkerState> {
    let installed = self.storage.len(&self.static_namespace)? > 0;
    let mut lifecycle = self.lifecycle();
    if installed && lifecycle.state() == WorkerState::Parsed {
      debug!("Found populated {}, resuming as installed", self.static_namespace);
      lifecycle.set_state(WorkerState::Installed);
    }
    Ok(lifecycle.state())
  }

  /// Pre-cache the manifest into the static namespace, all or nothing.
  ///
  /// Returns the number of entries stored. Activates right away when
  /// skip-waiting is set.
  pub async fn install(&self) -> Result<usize> {
    info!("Installing: caching {} static assets", self.manifest.len());
    self.lifecycle().set_state(WorkerState::Installing);

    let result = async {
      let urls = self
        .manifest
        .iter()
        .map(|u| self.resolve(u))
        .collect::<Result<Vec<_>>>()?;
      let entries = self.precache(urls).await?;
      self.storage.put_all(&self.static_namespace, &entries)?;
      Ok::<_, Error>(entries.len())
    }
    .await;

    match result {
      Ok(count) => {
        info!("Static assets cached ({} entries)", count);
        let activate_now = {
          let mut lifecycle = self.lifecycle();
          lifecycle.set_state(WorkerState::Installed);
          lifecycle.should_activate()
        };
        if activate_now {
          self.activate()?;
        }
        Ok(count)
      }
      Err(e) => {
        error!("Install failed: {}", e);
        self.lifecycle().set_state(WorkerState::Parsed);
        Err(e)
      }
    }
  }

  /// Delete every namespace except the current static and dynamic ones.
  ///
  /// Returns the names that were deleted.
  pub fn activate(&self) -> Result<Vec<String>> {
    info!("Activating");
    let previous = {
      let mut lifecycle = self.lifecycle();
      let previous = lifecycle.state();
      lifecycle.set_state(WorkerState::Activating);
      previous
    };

    let keep = [self.static_namespace.as_str(), self.dynamic_namespace.as_str()];
    match self.rotate_namespaces(&keep) {
      Ok(deleted) => {
        self.lifecycle().set_state(WorkerState::Activated);
        Ok(deleted)
      }
      Err(e) => {
        self.lifecycle().set_state(previous);
        Err(e)
      }
    }
  }

  /// Delete every namespace not named in `keep`, then make sure all of `keep` exist.
  pub fn rotate_namespaces(&self, keep: &[&str]) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for name in self.storage.namespaces()? {
      if !keep.contains(&name.as_str()) {
        info!("Deleting old cache {}", name);
        self.storage.delete(&name)?;
        deleted.push(name);
      }
    }

    for name in keep {
      self.storage.open(name)?;
    }

    Ok(deleted)
  }

  /// Handle a runtime control message.
  pub async fn on_message(&self, message: ControlMessage) -> Result<MessageOutcome> {
    match message {
      ControlMessage::SkipWaiting => {
        let activate_now = self.lifecycle().request_skip_waiting();
        if activate_now {
          self.activate()?;
        }
        Ok(MessageOutcome::SkipWaiting {
          activated: activate_now,
        })
      }
      ControlMessage::CacheUrls(urls) => {
        let urls = urls
          .iter()
          .map(|u| self.resolve(u))
          .collect::<Result<Vec<_>>>()?;
        let entries = self.precache(urls).await?;
        self.storage.put_all(&self.dynamic_namespace, &entries)?;
        info!("Cached {} URLs on request", entries.len());
        Ok(MessageOutcome::Cached(entries.len()))
      }
      ControlMessage::CleanCache => {
        let names = self.storage.namespaces()?;
        for name in &names {
          self.storage.delete(name)?;
        }
        info!("Deleted {} caches", names.len());
        Ok(MessageOutcome::Cleaned(names))
      }
    }
  }

  /// Fetch every URL concurrently; any failure or non-OK status fails the batch.
  async fn precache(&self, urls: Vec<Url>) -> Result<Vec<(CacheKey, Response)>> {
    let fetches = urls.into_iter().map(|url| async move {
      let request = Request::get(url);
      let response = self
        .fetcher
        .fetch(&request)
        .await
        .map_err(|e| Error::ManifestFetch {
          url: request.url.to_string(),
          reason: e.to_string(),
        })?;

      if !response.is_ok() {
        return Err(Error::ManifestFetch {
          url: request.url.to_string(),
          reason: format!("HTTP {}", response.status),
        });
      }

      Ok::<_, Error>((CacheKey::for_request(&request), response))
    });

    try_join_all(fetches).await
  }
}

impl<S: CacheStorage, F: Fetcher> Clone for CacheRouter<S, F> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      policy: Arc::clone(&self.policy),
      scope: self.scope.clone(),
      origin: self.origin.clone(),
      static_namespace: self.static_namespace.clone(),
      dynamic_namespace: self.dynamic_namespace.clone(),
      manifest: self.manifest.clone(),
      slow_request_threshold: self.slow_request_threshold,
      lifecycle: Arc::clone(&self.lifecycle),
      background: Arc::clone(&self.background),
    }
  }
}

/// Holds one slot of the in-flight counter; released on drop, including unwinds.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
  fn enter(counter: Arc<watch::Sender<usize>>) -> Self {
    counter.send_modify(|count| *count += 1);
    Self(counter)
  }
}

impl Drop for InFlight {
  fn drop(&mut self) {
    self.0.send_modify(|count| *count -= 1);
  }
}

/// Fetch and, on an OK status, overwrite the entry in `namespace`.
async fn revalidate<S: CacheStorage, F: Fetcher>(
  storage: Arc<S>,
  fetcher: Arc<F>,
  namespace: String,
  key: CacheKey,
  request: Request,
) -> Result<Response> {
  let response = fetcher.fetch(&request).await?;
  if response.is_ok() {
    store(&*storage, &namespace, &key, &response);
  }
  Ok(response)
}

/// Write an entry; a failed write is logged and otherwise ignored.
fn store<S: CacheStorage + ?Sized>(storage: &S, namespace: &str, key: &CacheKey, response: &Response) {
  if let Err(e) = storage.put(namespace, key, response) {
    warn!("Failed to cache {}: {}", key.description(), e);
  }
}
