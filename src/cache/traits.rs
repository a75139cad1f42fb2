//! Core types for the page cache.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if restored from disk)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result for an in-memory hit.
  pub fn from_memory(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Memory,
      cached_at: None,
    }
  }

  /// Create a new cache result restored from the snapshot store.
  pub fn from_disk(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Disk,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where page data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Page already held for the current session
  Memory,
  /// Snapshot restored from a previous run
  Disk,
}

/// Identifies one page of one query in the snapshot store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageKey {
  pub query: String,
  pub page: u32,
}

impl PageKey {
  pub fn new(query: &str, page: u32) -> Self {
    Self {
      query: query.to_string(),
      page,
    }
  }

  /// Stable, fixed-length key for the query part.
  pub fn query_hash(&self) -> String {
    hash_query(&self.query)
  }
}

/// SHA256 of the normalized query.
pub fn hash_query(query: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(normalize_query(query).as_bytes());
  hex::encode(hasher.finalize())
}

/// Normalize a query for consistent hashing.
/// Tags are case-insensitive and whitespace separated.
fn normalize_query(query: &str) -> String {
  query
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_hash_ignores_case_and_spacing() {
    let a = PageKey::new("Cat  rating:s", 1);
    let b = PageKey::new(" cat rating:s ", 2);
    assert_eq!(a.query_hash(), b.query_hash());
    assert_eq!(a.query_hash().len(), 64);
  }

  #[test]
  fn test_distinct_queries_hash_differently() {
    assert_ne!(hash_query("cat"), hash_query("dog"));
  }
}
