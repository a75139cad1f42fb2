//! Page caching for the current session.
//!
//! This module provides:
//! - An in-memory map of page views, one per page number, dropped when a new
//!   query starts
//! - A snapshot store (SQLite) so pages fetched in an earlier run can be
//!   restored on resume instead of fetched again
//! - Lookup that answers from memory first, then from a fresh snapshot

mod layer;
mod storage;
mod traits;

pub use layer::PageCache;
pub use storage::{NoopStorage, PageStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, PageKey};
