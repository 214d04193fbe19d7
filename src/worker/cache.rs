//! Cache store trait and its SQLite and in-memory implementations.
//!
//! Entries are grouped under generation tags; eviction happens by deleting a
//! whole generation, never per entry.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;
use url::Url;

use super::types::WireResponse;

/// Trait for versioned cache storage backends.
pub trait CacheStore: Send + Sync {
  /// Create the generation tagged `tag` if it does not already exist.
  fn open_generation(&self, tag: &str) -> Result<()>;

  /// All generation tags currently present.
  fn generations(&self) -> Result<Vec<String>>;

  /// Delete one generation and every entry under it.
  fn delete_generation(&self, tag: &str) -> Result<()>;

  /// Look up the entry for `url` in generation `tag`.
  fn get(&self, tag: &str, url: &Url) -> Result<Option<WireResponse>>;

  /// Store `response` for `url` in generation `tag`, replacing any prior
  /// entry for that exact URL.
  fn put(&self, tag: &str, url: &Url, response: &WireResponse) -> Result<()>;
}

/// SHA-256 of the URL for stable, fixed-length entry keys.
fn url_hash(url: &Url) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_str().as_bytes());
  hex::encode(hasher.finalize())
}

/// In-memory cache store for tests.
#[derive(Default)]
pub struct MemoryCacheStore {
  tags: Mutex<BTreeSet<String>>,
  entries: Mutex<HashMap<(String, String), WireResponse>>,
}

impl MemoryCacheStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryCacheStore {
  fn open_generation(&self, tag: &str) -> Result<()> {
    let mut tags = self.tags.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    tags.insert(tag.to_string());
    Ok(())
  }

  fn generations(&self) -> Result<Vec<String>> {
    let tags = self.tags.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(tags.iter().cloned().collect())
  }

  fn delete_generation(&self, tag: &str) -> Result<()> {
    let mut tags = self.tags.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    tags.remove(tag);
    entries.retain(|(entry_tag, _), _| entry_tag != tag);
    Ok(())
  }

  fn get(&self, tag: &str, url: &Url) -> Result<Option<WireResponse>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(&(tag.to_string(), url_hash(url))).cloned())
  }

  fn put(&self, tag: &str, url: &Url, response: &WireResponse) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert((tag.to_string(), url_hash(url)), response.clone());
    Ok(())
  }
}

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
  conn: Mutex<Connection>,
}

/// Schema for cache generations and entries.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_generations (
    tag TEXT PRIMARY KEY,
    opened_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cache_entries (
    generation TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, url_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_generation
    ON cache_entries(generation);
"#;

impl SqliteCacheStore {
  /// Open (or create) the cache database, running migrations.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl CacheStore for SqliteCacheStore {
  fn open_generation(&self, tag: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_generations (tag) VALUES (?)",
        params![tag],
      )
      .map_err(|e| eyre!("Failed to open cache generation {}: {}", tag, e))?;

    Ok(())
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT tag FROM cache_generations ORDER BY tag")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let tags: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache generations: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(tags)
  }

  fn delete_generation(&self, tag: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let deleted = conn
      .execute(
        "DELETE FROM cache_entries WHERE generation = ?",
        params![tag],
      )
      .and_then(|_| conn.execute("DELETE FROM cache_generations WHERE tag = ?", params![tag]));

    if let Err(e) = deleted {
      let _ = conn.execute("ROLLBACK", []);
      return Err(eyre!("Failed to delete cache generation {}: {}", tag, e));
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get(&self, tag: &str, url: &Url) -> Result<Option<WireResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, body FROM cache_entries
         WHERE generation = ? AND url_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let entry: Option<(u16, Option<String>, Vec<u8>)> = stmt
      .query_row(params![tag, url_hash(url)], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .ok();

    Ok(entry.map(|(status, content_type, body)| WireResponse {
      status,
      content_type,
      body,
    }))
  }

  fn put(&self, tag: &str, url: &Url, response: &WireResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (generation, url_hash, url, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          tag,
          url_hash(url),
          url.as_str(),
          response.status,
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry for {}: {}", url, e))?;

    Ok(())
  }
}
