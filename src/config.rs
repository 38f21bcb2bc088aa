use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::network::HttpFetcherOptions;
use crate::router::RouterOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin of the card generator application (e.g. "https://cards.example.com")
  pub origin: String,
  pub cache: CacheConfig,
  pub network: NetworkConfig,
  pub storage: StorageConfig,
  pub logging: LoggingConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:5000".to_string(),
      cache: CacheConfig::default(),
      network: NetworkConfig::default(),
      storage: StorageConfig::default(),
      logging: LoggingConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Name of the versioned static namespace; bump to invalidate
  pub static_name: String,
  pub dynamic_name: String,
  /// URLs pre-cached on install, relative to `origin` or absolute
  pub manifest: Vec<String>,
  /// Cross-origin hosts whose requests are cached
  pub external_hosts: Vec<String>,
  /// Activate right after install instead of waiting
  pub skip_waiting: bool,
  /// Requests slower than this many milliseconds are logged
  pub slow_request_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      static_name: "static-v2".to_string(),
      dynamic_name: "dynamic-v2".to_string(),
      manifest: [
        "/",
        "/create",
        "/preview",
        "/batch",
        "/static/css/style.css",
        "/static/js/app.js",
        "/static/js/card-preview.js",
        "/static/js/batch-processor.js",
        "/static/manifest.json",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
        "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      external_hosts: [
        "cdn.jsdelivr.net",
        "cdnjs.cloudflare.com",
        "fonts.googleapis.com",
        "fonts.gstatic.com",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      skip_waiting: true,
      slow_request_ms: 5000,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  /// Per-request deadline in seconds; unset means wait indefinitely
  pub timeout_secs: Option<u64>,
  pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Cache database path (default: $XDG_DATA_HOME/cardcache/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive used when RUST_LOG is not set
  pub level: String,
  /// Also write logs to $XDG_DATA_HOME/cardcache/cardcache.log
  pub file: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: false,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cardcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cardcache/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cardcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cardcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    self.origin_url()?;
    if self.cache.static_name == self.cache.dynamic_name {
      return Err(eyre!(
        "cache.static_name and cache.dynamic_name must differ (both are '{}')",
        self.cache.static_name
      ));
    }
    Ok(())
  }

  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  pub fn router_options(&self) -> Result<RouterOptions> {
    Ok(RouterOptions {
      origin: self.origin_url()?,
      static_namespace: self.cache.static_name.clone(),
      dynamic_namespace: self.cache.dynamic_name.clone(),
      manifest: self.cache.manifest.clone(),
      external_hosts: self.cache.external_hosts.clone(),
      skip_waiting: self.cache.skip_waiting,
      slow_request_threshold: Duration::from_millis(self.cache.slow_request_ms),
    })
  }

  pub fn fetcher_options(&self) -> HttpFetcherOptions {
    HttpFetcherOptions {
      timeout: self.network.timeout_secs.map(Duration::from_secs),
      user_agent: self.network.user_agent.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.cache.static_name, "static-v2");
    assert_eq!(config.cache.dynamic_name, "dynamic-v2");
    assert_eq!(config.cache.manifest.len(), 13);
    assert!(config.cache.external_hosts.contains(&"fonts.gstatic.com".to_string()));
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml(
      r#"
origin: https://cards.example.com
cache:
  static_name: static-v3
  manifest: ["/", "/static/css/style.css"]
network:
  timeout_secs: 10
"#,
    )
    .unwrap();

    assert_eq!(config.cache.static_name, "static-v3");
    assert_eq!(config.cache.dynamic_name, "dynamic-v2");
    assert_eq!(config.cache.manifest.len(), 2);
    assert_eq!(config.logging.level, "info");

    let options = config.router_options().unwrap();
    assert_eq!(options.origin.as_str(), "https://cards.example.com/");
    assert_eq!(options.slow_request_threshold, Duration::from_millis(5000));
    assert_eq!(config.fetcher_options().timeout, Some(Duration::from_secs(10)));
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let config = Config::from_yaml("origin: not a url").unwrap();
    assert!(config.validate().is_err());

    let config = Config::from_yaml("cache: { static_name: v1, dynamic_name: v1 }").unwrap();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cardcache.yaml");
    std::fs::write(&path, "origin: https://cards.test\nlogging: { level: debug }\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.origin, "https://cards.test");
    assert_eq!(config.logging.level, "debug");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}
