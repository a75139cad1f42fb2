//! Disk-backed session store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::{PageStatus, Session};
use crate::error::SessionError;
use crate::fsutil;

/// Owns the session for the current query and mirrors it to a JSON file.
///
/// Mutations update memory first and then persist. A failed write is
/// reported but never rolls the in-memory session back.
pub struct SessionStore {
  path: PathBuf,
  state: Mutex<Option<Session>>,
  /// Serializes writes. Each writer snapshots the state after acquiring it,
  /// so the file only ever moves forward.
  writer: tokio::sync::Mutex<()>,
}

impl SessionStore {
  /// A store with no active session.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      state: Mutex::new(None),
      writer: tokio::sync::Mutex::new(()),
    }
  }

  /// Open the store at `path`, adopting the session found there if it loads.
  pub async fn open(path: impl Into<PathBuf>) -> Self {
    let store = Self::new(path);
    if let Some(session) = Self::load(&store.path).await {
      info!(query = %session.query, last_page = session.last_viewed_page, "resumed session");
      *store.lock() = Some(session);
    }
    store
  }

  /// Load a session, treating any failure as "no session".
  pub async fn load(path: &Path) -> Option<Session> {
    match Self::try_load(path).await {
      Ok(session) => Some(session),
      Err(SessionError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no session file");
        None
      }
      Err(e) => {
        warn!(error = %e, "ignoring session file");
        None
      }
    }
  }

  pub async fn try_load(path: &Path) -> Result<Session, SessionError> {
    let data = tokio::fs::read(path)
      .await
      .map_err(|source| SessionError::Read {
        path: path.to_path_buf(),
        source,
      })?;

    let session: Session =
      serde_json::from_slice(&data).map_err(|source| SessionError::MalformedSessionFile {
        path: path.to_path_buf(),
        source,
      })?;

    if session.pages.iter().any(|e| e.page == 0) {
      return Err(SessionError::InvalidPageNumber {
        path: path.to_path_buf(),
      });
    }

    Ok(session)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Copy of the current session.
  pub fn snapshot(&self) -> Option<Session> {
    self.lock().clone()
  }

  pub fn query(&self) -> Option<String> {
    self.lock().as_ref().map(|s| s.query.clone())
  }

  /// Replace any existing session with a new one for `query` and persist it.
  pub async fn start_new(&self, query: &str, first_page: u32) -> Result<(), SessionError> {
    *self.lock() = Some(Session::new(query, first_page));
    info!(query, first_page, "started new session");
    self.persist().await
  }

  /// Insert or update the status of `page`, then persist.
  pub async fn record_page_status(&self, page: u32, status: PageStatus) -> Result<(), SessionError> {
    self.update(|s| s.upsert(page, status))?;
    self.persist().await
  }

  /// Remember `page` as the last one shown, then persist.
  pub async fn set_last_viewed(&self, page: u32) -> Result<(), SessionError> {
    self.update(|s| s.last_viewed_page = page)?;
    self.persist().await
  }

  /// Mark `page` fetched and shown in a single write.
  pub async fn record_visit(&self, page: u32) -> Result<(), SessionError> {
    self.update(|s| {
      s.upsert(page, PageStatus::Fetched);
      s.last_viewed_page = page;
    })?;
    self.persist().await
  }

  /// Write the current session to disk atomically.
  pub async fn persist(&self) -> Result<(), SessionError> {
    let _writer = self.writer.lock().await;

    let Some(session) = self.snapshot() else {
      return Ok(());
    };

    let data = serde_json::to_vec_pretty(&session).map_err(|e| SessionError::PersistenceFailed {
      path: self.path.clone(),
      source: std::io::Error::other(e),
    })?;

    fsutil::write_atomic(&self.path, &data)
      .await
      .map_err(|source| SessionError::PersistenceFailed {
        path: self.path.clone(),
        source,
      })
  }

  fn update<F: FnOnce(&mut Session)>(&self, f: F) -> Result<(), SessionError> {
    let mut state = self.lock();
    let session = state.as_mut().ok_or(SessionError::NoActiveSession)?;
    f(session);
    Ok(())
  }

  fn lock(&self) -> MutexGuard<'_, Option<Session>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use tempfile::tempdir;

  #[tokio::test]
  async fn test_persist_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("posts.json");
    let store = SessionStore::new(&path);

    store.start_new("cat", 1).await.unwrap();
    store.record_page_status(2, PageStatus::Fetched).await.unwrap();
    store.record_page_status(3, PageStatus::Failed).await.unwrap();
    store.set_last_viewed(2).await.unwrap();

    let loaded = SessionStore::load(&path).await.unwrap();
    assert_eq!(Some(loaded), store.snapshot());
  }

  #[tokio::test]
  async fn test_record_page_status_twice_keeps_one_entry() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("posts.json"));
    store.start_new("cat", 1).await.unwrap();

    store.record_page_status(2, PageStatus::Fetched).await.unwrap();
    store.record_page_status(2, PageStatus::Fetched).await.unwrap();

    let session = store.snapshot().unwrap();
    assert_eq!(session.pages.iter().filter(|e| e.page == 2).count(), 1);
  }

  #[tokio::test]
  async fn test_start_new_replaces_wholesale() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("posts.json");
    let store = SessionStore::new(&path);
    store.start_new("cat", 1).await.unwrap();
    store.record_page_status(2, PageStatus::Fetched).await.unwrap();

    store.start_new("dog", 1).await.unwrap();

    let loaded = SessionStore::load(&path).await.unwrap();
    assert_eq!(loaded, Session::new("dog", 1));
  }

  #[tokio::test]
  async fn test_load_scenario_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("posts.json");
    std::fs::write(
      &path,
      r#"{"query":"cat","pages":[{"page":1,"status":"fetched"}],"last_page":1}"#,
    )
    .unwrap();

    let store = SessionStore::open(&path).await;
    let session = store.snapshot().unwrap();
    assert_eq!(session.last_viewed_page, 1);
    assert_eq!(session.query, "cat");
  }

  #[tokio::test]
  async fn test_load_is_silent_on_bad_input() {
    let dir = tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(SessionStore::load(&missing).await.is_none());

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{{{{").unwrap();
    assert!(SessionStore::load(&garbage).await.is_none());

    let wrong_shape = dir.path().join("shape.json");
    std::fs::write(&wrong_shape, r#"{"query": 5, "pages": "no"}"#).unwrap();
    assert!(SessionStore::load(&wrong_shape).await.is_none());

    let zero_page = dir.path().join("zero.json");
    std::fs::write(
      &zero_page,
      r#"{"query":"cat","pages":[{"page":0,"status":"fetched"}],"last_page":0}"#,
    )
    .unwrap();
    assert!(SessionStore::load(&zero_page).await.is_none());
  }

  #[tokio::test]
  async fn test_write_failure_keeps_memory_state() {
    let dir = tempdir().unwrap();
    // A regular file where the parent directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let store = SessionStore::new(blocker.join("posts.json"));

    let err = store.start_new("cat", 1).await.unwrap_err();
    assert!(matches!(err, SessionError::PersistenceFailed { .. }));

    let err = store
      .record_page_status(2, PageStatus::Fetched)
      .await
      .unwrap_err();
    assert!(matches!(err, SessionError::PersistenceFailed { .. }));

    let session = store.snapshot().unwrap();
    assert_eq!(session.status_of(2), Some(PageStatus::Fetched));
  }

  #[tokio::test]
  async fn test_mutation_without_session_is_rejected() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("posts.json"));
    assert!(matches!(
      store.record_page_status(1, PageStatus::Fetched).await,
      Err(SessionError::NoActiveSession)
    ));
  }

  #[tokio::test]
  async fn test_concurrent_writes_leave_latest_state_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("posts.json");
    let store = Arc::new(SessionStore::new(&path));
    store.start_new("cat", 1).await.unwrap();

    let mut handles = Vec::new();
    for page in 2..=20 {
      let store = store.clone();
      handles.push(tokio::spawn(async move {
        store.record_page_status(page, PageStatus::Fetched).await
      }));
    }
    for handle in handles {
      handle.await.unwrap().unwrap();
    }

    let on_disk = SessionStore::load(&path).await.unwrap();
    assert_eq!(on_disk.pages.len(), 20);
    assert_eq!(Some(on_disk), store.snapshot());
  }
}
