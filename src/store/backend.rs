//! Key-value persistence backends for the document store.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Trait for flat key-value storage backends.
///
/// Each collection lives under a single key as one JSON document; backends
/// only move opaque strings.
pub trait StoreBackend: Send + Sync {
  /// Read the value under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Write `value` under `key`, replacing any prior value.
  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Delete `key`. Deleting an absent key is not an error.
  fn remove(&self, key: &str) -> Result<()>;

  /// Write several keys as one atomic unit: either every entry lands or
  /// none do.
  fn set_many(&self, entries: &[(&str, String)]) -> Result<()>;
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryBackend {
  values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StoreBackend for MemoryBackend {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.remove(key);
    Ok(())
  }

  fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    for (key, value) in entries {
      values.insert((*key).to_string(), value.clone());
    }
    Ok(())
  }
}

/// SQLite-backed key-value store. One `kv` table, one row per key.
pub struct SqliteBackend {
  conn: Mutex<Connection>,
}

/// Schema for the flat key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SqliteBackend {
  /// Open (or create) the store database, running migrations.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl StoreBackend for SqliteBackend {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM kv WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete key {}: {}", key, e))?;

    Ok(())
  }

  fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, value) in entries {
      if let Err(e) = conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
        params![key, value],
      ) {
        let _ = conn.execute("ROLLBACK", []);
        return Err(eyre!("Failed to write key {}: {}", key, e));
      }
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_backend_round_trip() {
    let backend = MemoryBackend::new();
    assert_eq!(backend.get("k").unwrap(), None);

    backend.set("k", "v1").unwrap();
    assert_eq!(backend.get("k").unwrap(), Some("v1".to_string()));

    backend.set("k", "v2").unwrap();
    assert_eq!(backend.get("k").unwrap(), Some("v2".to_string()));

    backend.remove("k").unwrap();
    assert_eq!(backend.get("k").unwrap(), None);

    // Removing an absent key is a no-op
    backend.remove("k").unwrap();
  }

  #[test]
  fn sqlite_backend_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::open_at(&dir.path().join("store.db")).unwrap();

    backend.set("a", "1").unwrap();
    backend
      .set_many(&[("b", "2".to_string()), ("c", "3".to_string())])
      .unwrap();

    assert_eq!(backend.get("a").unwrap(), Some("1".to_string()));
    assert_eq!(backend.get("b").unwrap(), Some("2".to_string()));
    assert_eq!(backend.get("c").unwrap(), Some("3".to_string()));

    backend.remove("b").unwrap();
    assert_eq!(backend.get("b").unwrap(), None);
  }

  #[test]
  fn sqlite_backend_persists_across_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
      let backend = SqliteBackend::open_at(&path).unwrap();
      backend.set("k", "kept").unwrap();
    }

    let backend = SqliteBackend::open_at(&path).unwrap();
    assert_eq!(backend.get("k").unwrap(), Some("kept".to_string()));
  }
}
