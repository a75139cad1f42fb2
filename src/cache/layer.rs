//! Cache layer that orchestrates the in-memory page views and the snapshot
//! store.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::storage::PageStorage;
use super::traits::{CacheResult, PageKey};
use crate::api::types::Page;

/// Page cache for the current session.
///
/// Holds at most one view per page number. Views are only dropped by
/// [`PageCache::reset`] when a new query starts. Fetched pages are also
/// written to the snapshot store so a later run can restore them.
pub struct PageCache<S: PageStorage> {
  views: Mutex<HashMap<u32, Arc<Page>>>,
  storage: Arc<S>,
  /// How long before a snapshot is considered stale
  stale_time: Duration,
  /// Whether snapshots may be served at all
  restore: bool,
}

impl<S: PageStorage> PageCache<S> {
  /// Create a new page cache with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      views: Mutex::new(HashMap::new()),
      storage: Arc::new(storage),
      stale_time: Duration::minutes(60),
      restore: true,
    }
  }

  /// Set the stale time for snapshots.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Enable or disable serving snapshots from the store.
  pub fn with_restore(mut self, restore: bool) -> Self {
    self.restore = restore;
    self
  }

  /// Check if a snapshot is stale based on its cached_at timestamp.
  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - cached_at >= self.stale_time
  }

  /// In-memory view for `page`, if held.
  pub fn get(&self, page: u32) -> Option<Arc<Page>> {
    self.views().get(&page).cloned()
  }

  pub fn len(&self) -> usize {
    self.views().len()
  }

  /// Look a page up without touching the network.
  ///
  /// 1. In-memory view
  /// 2. Fresh snapshot for the same query (promoted into memory)
  pub fn lookup(&self, query: &str, page: u32) -> Option<CacheResult<Arc<Page>>> {
    if let Some(view) = self.get(page) {
      debug!(page, "page cache hit");
      return Some(CacheResult::from_memory(view));
    }

    if !self.restore {
      return None;
    }

    let key = PageKey::new(query, page);
    let cached = match self.storage.get_page(&key) {
      Ok(Some(cached)) => cached,
      Ok(None) => return None,
      Err(e) => {
        warn!(page, error = %e, "page snapshot lookup failed");
        return None;
      }
    };

    if self.is_stale(cached.cached_at) || cached.page.query != query {
      debug!(page, "page snapshot is stale");
      return None;
    }

    debug!(page, "restored page from snapshot");
    let view = self.promote(cached.page);
    Some(CacheResult::from_disk(view, cached.cached_at))
  }

  /// Store a freshly fetched page, replacing any view for the same number.
  pub fn insert(&self, page: Page) -> Arc<Page> {
    let key = PageKey::new(&page.query, page.page_number);
    if let Err(e) = self.storage.store_page(&key, &page) {
      warn!(page = page.page_number, error = %e, "failed to store page snapshot");
    }
    self.promote(page)
  }

  /// Drop every view and every snapshot that does not belong to `query`.
  pub fn reset(&self, query: &str) {
    self.views().clear();
    if let Err(e) = self.storage.retain_query(query) {
      warn!(error = %e, "failed to prune page snapshots");
    }
  }

  fn promote(&self, page: Page) -> Arc<Page> {
    let view = Arc::new(page);
    self.views().insert(view.page_number, Arc::clone(&view));
    view
  }

  fn views(&self) -> MutexGuard<'_, HashMap<u32, Arc<Page>>> {
    self.views.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures::page;
  use crate::cache::storage::{NoopStorage, SqliteStorage};
  use crate::cache::CacheSource;

  #[test]
  fn test_lookup_after_insert_is_a_memory_hit() {
    let cache = PageCache::new(NoopStorage);
    assert!(cache.lookup("cat", 1).is_none());

    let inserted = cache.insert(page("cat", 1, 3));
    let hit = cache.lookup("cat", 1).unwrap();
    assert_eq!(hit.source, CacheSource::Memory);
    assert!(Arc::ptr_eq(&inserted, &hit.data));
  }

  #[test]
  fn test_fresh_snapshot_is_restored() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .store_page(&PageKey::new("cat", 1), &page("cat", 1, 3))
      .unwrap();
    let cache = PageCache::new(storage);

    let hit = cache.lookup("cat", 1).unwrap();
    assert_eq!(hit.source, CacheSource::Disk);
    assert!(hit.cached_at.is_some());
    // Promoted into memory
    assert!(cache.get(1).is_some());
  }

  #[test]
  fn test_stale_or_disabled_snapshots_are_ignored() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .store_page(&PageKey::new("cat", 1), &page("cat", 1, 3))
      .unwrap();
    let cache = PageCache::new(storage).with_stale_time(Duration::zero());
    assert!(cache.lookup("cat", 1).is_none());

    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .store_page(&PageKey::new("cat", 1), &page("cat", 1, 3))
      .unwrap();
    let cache = PageCache::new(storage).with_restore(false);
    assert!(cache.lookup("cat", 1).is_none());
  }

  #[test]
  fn test_reset_clears_views() {
    let cache = PageCache::new(NoopStorage);
    cache.insert(page("cat", 1, 3));
    cache.insert(page("cat", 2, 3));
    assert_eq!(cache.len(), 2);

    cache.reset("dog");
    assert_eq!(cache.len(), 0);
  }

  #[test]
  fn test_insert_keeps_one_view_per_page() {
    let cache = PageCache::new(NoopStorage);
    cache.insert(page("cat", 1, 3));
    let replacement = cache.insert(page("cat", 1, 4));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(1).unwrap().max_page, replacement.max_page);
  }
}
