//! Cache storage implementations: in-memory and SQLite.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::key::CacheKey;
use super::traits::{CacheStorage, CachedEntry};
use crate::error::{Error, Result};
use crate::http::Response;

#[derive(Debug, Default)]
struct Namespace {
  name: String,
  entries: HashMap<String, CachedEntry>,
}

/// Storage that lives only as long as the process.
/// Used for tests and for `--memory` runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  namespaces: Mutex<Vec<Namespace>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

fn open_in(namespaces: &mut Vec<Namespace>, name: &str) -> usize {
  match namespaces.iter().position(|ns| ns.name == name) {
    Some(idx) => idx,
    None => {
      namespaces.push(Namespace {
        name: name.to_string(),
        entries: HashMap::new(),
      });
      namespaces.len() - 1
    }
  }
}

fn entry_for(key: &CacheKey, response: &Response) -> CachedEntry {
  CachedEntry {
    key: key.clone(),
    response: response.clone(),
    cached_at: Utc::now(),
  }
}

impl CacheStorage for MemoryStorage {
  fn open(&self, namespace: &str) -> Result<()> {
    let mut namespaces = self.namespaces.lock()?;
    open_in(&mut namespaces, namespace);
    Ok(())
  }

  fn namespaces(&self) -> Result<Vec<String>> {
    let namespaces = self.namespaces.lock()?;
    Ok(namespaces.iter().map(|ns| ns.name.clone()).collect())
  }

  fn delete(&self, namespace: &str) -> Result<bool> {
    let mut namespaces = self.namespaces.lock()?;
    let before = namespaces.len();
    namespaces.retain(|ns| ns.name != namespace);
    Ok(namespaces.len() != before)
  }

  fn get(&self, namespace: &str, key: &CacheKey) -> Result<Option<CachedEntry>> {
    let namespaces = self.namespaces.lock()?;
    Ok(
      namespaces
        .iter()
        .find(|ns| ns.name == namespace)
        .and_then(|ns| ns.entries.get(&key.cache_hash()))
        .cloned(),
    )
  }

  fn match_any(&self, key: &CacheKey) -> Result<Option<CachedEntry>> {
    let namespaces = self.namespaces.lock()?;
    let hash = key.cache_hash();
    Ok(
      namespaces
        .iter()
        .find_map(|ns| ns.entries.get(&hash))
        .cloned(),
    )
  }

  fn put(&self, namespace: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let mut namespaces = self.namespaces.lock()?;
    let idx = open_in(&mut namespaces, namespace);
    namespaces[idx]
      .entries
      .insert(key.cache_hash(), entry_for(key, response));
    Ok(())
  }

  fn put_all(&self, namespace: &str, entries: &[(CacheKey, Response)]) -> Result<()> {
    let mut namespaces = self.namespaces.lock()?;
    let idx = open_in(&mut namespaces, namespace);
    for (key, response) in entries {
      namespaces[idx]
        .entries
        .insert(key.cache_hash(), entry_for(key, response));
    }
    Ok(())
  }

  fn len(&self, namespace: &str) -> Result<usize> {
    let namespaces = self.namespaces.lock()?;
    Ok(
      namespaces
        .iter()
        .find(|ns| ns.name == namespace)
        .map(|ns| ns.entries.len())
        .unwrap_or(0),
    )
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open_default() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the cache database at the given path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    debug!("Opening cache database at {}", path.display());
    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// A private database that disappears with the process.
  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| {
        Error::Io(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "Could not determine data directory",
        ))
      })?;

    Ok(data_dir.join("cardcache").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Named partitions; rowid preserves creation order
CREATE TABLE IF NOT EXISTS namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entries (
    namespace TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key_hash),
    FOREIGN KEY (namespace) REFERENCES namespaces(name) ON DELETE CASCADE
);
"#;

fn insert_namespace(conn: &Connection, namespace: &str) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO namespaces (name) VALUES (?)",
    params![namespace],
  )?;
  Ok(())
}

fn insert_entry(
  conn: &Connection,
  namespace: &str,
  key: &CacheKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)?;
  conn.execute(
    "INSERT OR REPLACE INTO entries (namespace, key_hash, method, url, status, headers, body, cached_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    params![
      namespace,
      key.cache_hash(),
      key.method().as_str(),
      key.url().as_str(),
      response.status,
      headers,
      &response.body[..],
      Utc::now().to_rfc3339(),
    ],
  )?;
  Ok(())
}

type EntryRow = (u16, String, Vec<u8>, String);

fn row_to_entry(key: &CacheKey, row: EntryRow) -> Result<CachedEntry> {
  let (status, headers, body, cached_at) = row;
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)?;
  Ok(CachedEntry {
    key: key.clone(),
    response: Response::new(status, headers, Bytes::from(body)),
    cached_at: parse_datetime(&cached_at),
  })
}

/// Parse a stored RFC 3339 timestamp, falling back to now for foreign rows.
fn parse_datetime(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|_| Utc::now())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, namespace: &str) -> Result<()> {
    let conn = self.conn.lock()?;
    insert_namespace(&conn, namespace)
  }

  fn namespaces(&self) -> Result<Vec<String>> {
    let conn = self.conn.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY rowid")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  fn delete(&self, namespace: &str) -> Result<bool> {
    let conn = self.conn.lock()?;
    let removed = conn.execute("DELETE FROM namespaces WHERE name = ?", params![namespace])?;
    Ok(removed > 0)
  }

  fn get(&self, namespace: &str, key: &CacheKey) -> Result<Option<CachedEntry>> {
    let conn = self.conn.lock()?;
    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM entries
         WHERE namespace = ? AND key_hash = ?",
        params![namespace, key.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    row.map(|r| row_to_entry(key, r)).transpose()
  }

  fn match_any(&self, key: &CacheKey) -> Result<Option<CachedEntry>> {
    let conn = self.conn.lock()?;
    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT e.status, e.headers, e.body, e.cached_at FROM entries e
         INNER JOIN namespaces n ON n.name = e.namespace
         WHERE e.key_hash = ?
         ORDER BY n.rowid
         LIMIT 1",
        params![key.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    row.map(|r| row_to_entry(key, r)).transpose()
  }

  fn put(&self, namespace: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    insert_namespace(&tx, namespace)?;
    insert_entry(&tx, namespace, key, response)?;
    tx.commit()?;
    Ok(())
  }

  fn put_all(&self, namespace: &str, entries: &[(CacheKey, Response)]) -> Result<()> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    insert_namespace(&tx, namespace)?;
    for (key, response) in entries {
      insert_entry(&tx, namespace, key, response)?;
    }
    tx.commit()?;
    Ok(())
  }

  fn len(&self, namespace: &str) -> Result<usize> {
    let conn = self.conn.lock()?;
    let count: i64 = conn.query_row(
      "SELECT COUNT(*) FROM entries WHERE namespace = ?",
      params![namespace],
      |row| row.get(0),
    )?;
    Ok(count as usize)
  }
}
