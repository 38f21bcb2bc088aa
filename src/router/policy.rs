//! Request classification: which requests are intercepted and which strategy serves them.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Caching strategy for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  CacheFirst,
  NetworkFirst,
  StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::CacheFirst => "cache-first",
      Self::NetworkFirst => "network-first",
      Self::StaleWhileRevalidate => "stale-while-revalidate",
    };
    f.write_str(name)
  }
}

// Card generation, batch upload and data-exchange formats
static NETWORK_FIRST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  compile(&[
    r"/generate_card/.+",
    r"/batch_upload",
    r"\.(?:php|asp|cgi|json|xml)$",
  ])
});

static STATIC_ASSET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  compile(&[
    r"/static/",
    r"\.(?:css|js|png|jpg|jpeg|gif|svg|ico|woff|woff2|ttf|otf)$",
  ])
});

static DYNAMIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  compile(&[
    r"/generate_card/.+",
    r"/batch_upload",
    r"/static/",
    r"\.html?$",
    r"\.(?:png|jpg|jpeg|svg|gif|webp|ico|woff|woff2|ttf|otf)$",
  ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
  patterns
    .iter()
    .map(|p| Regex::new(p).expect("valid route pattern"))
    .collect()
}

/// One row of the classification table.
pub struct Route {
  pub name: &'static str,
  patterns: &'static LazyLock<Vec<Regex>>,
  pub strategy: Strategy,
}

impl Route {
  fn matches(&self, path: &str) -> bool {
    self.patterns.iter().any(|re| re.is_match(path))
  }
}

/// Ordered URL-pattern table. First match wins; unmatched requests are cache-first.
pub struct RoutePolicy {
  routes: Vec<Route>,
  default: Strategy,
}

impl Default for RoutePolicy {
  fn default() -> Self {
    Self {
      routes: vec![
        Route {
          name: "network-first",
          patterns: &NETWORK_FIRST_PATTERNS,
          strategy: Strategy::NetworkFirst,
        },
        Route {
          name: "static-asset",
          patterns: &STATIC_ASSET_PATTERNS,
          strategy: Strategy::CacheFirst,
        },
        Route {
          name: "dynamic-content",
          patterns: &DYNAMIC_PATTERNS,
          strategy: Strategy::StaleWhileRevalidate,
        },
      ],
      default: Strategy::CacheFirst,
    }
  }
}

impl RoutePolicy {
  /// Pick the strategy for a URL. Patterns see only the path.
  pub fn classify(&self, url: &Url) -> Strategy {
    self
      .matching_route(url)
      .map(|route| route.strategy)
      .unwrap_or(self.default)
  }

  /// The first table row that matches, if any.
  pub fn matching_route(&self, url: &Url) -> Option<&Route> {
    let path = url.path();
    self.routes.iter().find(|route| route.matches(path))
  }
}

/// Own origin plus allow-listed external hosts. Everything else passes through.
#[derive(Debug, Clone)]
pub struct Scope {
  origin: url::Origin,
  external_hosts: BTreeSet<String>,
}

impl Scope {
  pub fn new<I, S>(origin: &Url, external_hosts: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      origin: origin.origin(),
      external_hosts: external_hosts
        .into_iter()
        .map(|h| h.into().to_lowercase())
        .collect(),
    }
  }

  pub fn is_same_origin(&self, url: &Url) -> bool {
    url.origin() == self.origin
  }

  pub fn is_allowed_external(&self, url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
      && url
        .host_str()
        .is_some_and(|host| self.external_hosts.contains(&host.to_lowercase()))
  }

  /// Whether the router should intercept requests to this URL.
  pub fn contains(&self, url: &Url) -> bool {
    self.is_same_origin(url) || self.is_allowed_external(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse("https://cards.test").unwrap().join(s).unwrap()
  }

  #[test]
  fn test_network_first_routes() {
    let policy = RoutePolicy::default();
    assert_eq!(policy.classify(&url("/generate_card/abc123")), Strategy::NetworkFirst);
    assert_eq!(policy.classify(&url("/batch_upload")), Strategy::NetworkFirst);
    assert_eq!(policy.classify(&url("/api/cards.json")), Strategy::NetworkFirst);
    // Data-exchange extensions win over the static prefix
    assert_eq!(policy.classify(&url("/static/manifest.json")), Strategy::NetworkFirst);
  }

  #[test]
  fn test_static_asset_routes() {
    let policy = RoutePolicy::default();
    assert_eq!(policy.classify(&url("/static/css/style.css")), Strategy::CacheFirst);
    assert_eq!(policy.classify(&url("/static/img/hero")), Strategy::CacheFirst);
    assert_eq!(policy.classify(&url("/logo.png")), Strategy::CacheFirst);
    assert_eq!(
      policy.matching_route(&url("/app.js")).map(|r| r.name),
      Some("static-asset")
    );
  }

  #[test]
  fn test_dynamic_routes() {
    let policy = RoutePolicy::default();
    assert_eq!(policy.classify(&url("/about.html")), Strategy::StaleWhileRevalidate);
    assert_eq!(policy.classify(&url("/photo.webp")), Strategy::StaleWhileRevalidate);
  }

  #[test]
  fn test_default_is_cache_first() {
    let policy = RoutePolicy::default();
    assert!(policy.matching_route(&url("/create")).is_none());
    assert_eq!(policy.classify(&url("/create")), Strategy::CacheFirst);
    assert_eq!(policy.classify(&url("/")), Strategy::CacheFirst);
  }

  #[test]
  fn test_query_does_not_affect_classification() {
    let policy = RoutePolicy::default();
    assert_eq!(policy.classify(&url("/app.js?v=3")), Strategy::CacheFirst);
    assert_eq!(policy.classify(&url("/preview?format=.json")), Strategy::CacheFirst);
  }

  #[test]
  fn test_scope() {
    let scope = Scope::new(&url("/"), ["cdn.jsdelivr.net", "Fonts.GStatic.com"]);

    assert!(scope.contains(&url("/static/js/app.js")));
    assert!(scope.contains(&Url::parse("https://cdn.jsdelivr.net/npm/x.css").unwrap()));
    assert!(scope.contains(&Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap()));
    assert!(!scope.contains(&Url::parse("https://evil.test/static/app.js").unwrap()));
    // Same host, different scheme is another origin
    assert!(!scope.contains(&Url::parse("http://cards.test/").unwrap()));
    // Host must match exactly, not as a substring
    assert!(!scope.contains(&Url::parse("https://cdn.jsdelivr.net.evil.test/").unwrap()));
  }
}
