//! Posts API: wire types, domain records and the fetch capabilities the
//! navigation core depends on.

pub mod api_types;
pub mod client;
pub mod types;

use std::future::Future;

use crate::error::FetchError;
use types::Page;

pub use client::PostsClient;

/// Remote page fetch capability.
pub trait PostSource: Send + Sync {
  /// Fetch page `page` (1-based) of the results for `query`.
  fn fetch_page(
    &self,
    query: &str,
    page: u32,
  ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// Raw byte download capability used by the download cache.
pub trait MediaSource: Send + Sync {
  fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}
