//! Page snapshot storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{hash_query, PageKey};
use crate::api::types::Page;

/// A page restored from the snapshot store.
#[derive(Debug, Clone)]
pub struct CachedPage {
  pub page: Page,
  /// When the page was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for page snapshot backends.
pub trait PageStorage: Send + Sync {
  /// Store (or replace) a fetched page.
  fn store_page(&self, key: &PageKey, page: &Page) -> Result<()>;

  /// Get the stored snapshot for a page.
  fn get_page(&self, key: &PageKey) -> Result<Option<CachedPage>>;

  /// Drop every snapshot that does not belong to `query`.
  fn retain_query(&self, query: &str) -> Result<()>;
}

impl<T: PageStorage + ?Sized> PageStorage for Box<T> {
  fn store_page(&self, key: &PageKey, page: &Page) -> Result<()> {
    (**self).store_page(key, page)
  }

  fn get_page(&self, key: &PageKey) -> Result<Option<CachedPage>> {
    (**self).get_page(key)
  }

  fn retain_query(&self, query: &str) -> Result<()> {
    (**self).retain_query(query)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when page restore is disabled - all operations are no-ops.
pub struct NoopStorage;

impl PageStorage for NoopStorage {
  fn store_page(&self, _key: &PageKey, _page: &Page) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_page(&self, _key: &PageKey) -> Result<Option<CachedPage>> {
    Ok(None) // Always miss
  }

  fn retain_query(&self, _query: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the snapshot database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Snapshot store that lives only as long as this value.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per fetched page (serialized JSON)
CREATE TABLE IF NOT EXISTS page_cache (
    query_hash TEXT NOT NULL,
    page INTEGER NOT NULL,
    query TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (query_hash, page)
);
"#;

impl PageStorage for SqliteStorage {
  fn store_page(&self, key: &PageKey, page: &Page) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data = serde_json::to_vec(page).map_err(|e| eyre!("Failed to serialize page: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO page_cache (query_hash, page, query, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key.query_hash(), key.page, key.query, data],
      )
      .map_err(|e| eyre!("Failed to store page: {}", e))?;

    Ok(())
  }

  fn get_page(&self, key: &PageKey) -> Result<Option<CachedPage>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM page_cache WHERE query_hash = ? AND page = ?",
        params![key.query_hash(), key.page],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query page: {}", e))?;

    match row {
      Some((data, cached_at_str)) => {
        let page: Page =
          serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize page: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedPage { page, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn retain_query(&self, query: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM page_cache WHERE query_hash != ?",
        params![hash_query(query)],
      )
      .map_err(|e| eyre!("Failed to prune page cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures::page;
  use tempfile::tempdir;

  #[test]
  fn test_store_and_get() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = PageKey::new("cat", 2);
    let original = page("cat", 2, 3);

    storage.store_page(&key, &original).unwrap();
    let cached = storage.get_page(&key).unwrap().unwrap();

    assert_eq!(cached.page, original);
    assert!(Utc::now() - cached.cached_at < chrono::Duration::minutes(1));
    assert!(storage.get_page(&PageKey::new("cat", 3)).unwrap().is_none());
  }

  #[test]
  fn test_retain_query_drops_other_queries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .store_page(&PageKey::new("cat", 1), &page("cat", 1, 3))
      .unwrap();
    storage
      .store_page(&PageKey::new("dog", 1), &page("dog", 1, 3))
      .unwrap();

    storage.retain_query("dog").unwrap();

    assert!(storage.get_page(&PageKey::new("cat", 1)).unwrap().is_none());
    assert!(storage.get_page(&PageKey::new("dog", 1)).unwrap().is_some());
  }

  #[test]
  fn test_snapshots_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache").join("pages.db");
    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage
        .store_page(&PageKey::new("cat", 1), &page("cat", 1, 3))
        .unwrap();
    }

    let storage = SqliteStorage::open(&path).unwrap();
    assert!(storage.get_page(&PageKey::new("cat", 1)).unwrap().is_some());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage
      .store_page(&PageKey::new("cat", 1), &page("cat", 1, 1))
      .unwrap();
    assert!(storage.get_page(&PageKey::new("cat", 1)).unwrap().is_none());
  }
}
