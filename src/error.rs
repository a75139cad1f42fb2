//! Typed errors for the navigation core.
//!
//! Each component converts I/O failures at its own boundary into one of these
//! kinds. Wiring code in `app` and `main` wraps them with `color_eyre`.

use std::path::PathBuf;

/// The remote page or media fetch failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  #[error("request to {url} failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("server returned {status} for {url}")]
  Status { status: u16, url: String },

  #[error("failed to decode response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid url: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

/// Navigation failures. Reaching either end of the result set is not an
/// error, see [`crate::navigator::Navigation`].
#[derive(Debug, thiserror::Error)]
pub enum NavError {
  /// Another page fetch is still in flight.
  #[error("a page fetch is already in progress")]
  Busy,

  #[error("failed to fetch page {page}: {source}")]
  FetchFailed {
    page: u32,
    #[source]
    source: FetchError,
  },

  /// The query changed while the fetch was running; its result was dropped.
  #[error("result for page {page} arrived after the query changed")]
  Superseded { page: u32 },

  #[error("no search is active")]
  NoActiveQuery,

  #[error("search query is empty")]
  EmptyQuery,

  #[error("page {0} is out of range")]
  InvalidPage(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  /// The session could not be written. In-memory state is kept.
  #[error("failed to persist session to {path}: {source}")]
  PersistenceFailed {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed session file {path}: {source}")]
  MalformedSessionFile {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("session file {path} has page number 0")]
  InvalidPageNumber { path: PathBuf },

  #[error("failed to read session file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("no session is active")]
  NoActiveSession,
}

/// Media download failures (the `DownloadFailed` kind). Never retried here.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
  #[error("record {id} has no media at the requested quality")]
  NoMedia { id: u64 },

  #[error("failed to download {url}: {source}")]
  Fetch {
    url: String,
    #[source]
    source: FetchError,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("settings file not found: {0}")]
  NotFound(PathBuf),

  #[error("malformed settings file {path}: {source}")]
  MalformedSettingsFile {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to access settings file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not determine a data directory")]
  NoDataDir,
}
