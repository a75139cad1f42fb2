//! Page navigation over the current query.
//!
//! The navigator answers "page N / next / previous" from the page cache and
//! only calls the remote source on a miss. At most one remote fetch runs at a
//! time; a request that needs the network while one is pending gets
//! [`NavError::Busy`]. Every query change bumps an epoch, and a fetch that
//! completes under an older epoch is dropped instead of cached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::api::types::{Page, Record, SortOrder};
use crate::api::PostSource;
use crate::cache::{CacheResult, CacheSource, PageCache, PageStorage};
use crate::error::{NavError, SessionError};
use crate::session::{PageStatus, Session, SessionStore};

/// Outcome of a relative move.
#[derive(Debug)]
pub enum Navigation {
  Page(PageView),
  /// Already on the first or last page
  NoMorePages,
}

/// A cached page as presented to the caller.
///
/// The record order is computed from the sort order at retrieval time; the
/// shared page itself keeps fetch order.
#[derive(Debug, Clone)]
pub struct PageView {
  page: Arc<Page>,
  source: CacheSource,
  order: Vec<usize>,
}

impl PageView {
  fn new(page: Arc<Page>, source: CacheSource, sort: SortOrder) -> Self {
    let order = page.order_by(sort);
    Self {
      page,
      source,
      order,
    }
  }

  pub fn page(&self) -> &Page {
    &self.page
  }

  pub fn number(&self) -> u32 {
    self.page.page_number
  }

  pub fn max_page(&self) -> u32 {
    self.page.max_page
  }

  pub fn source(&self) -> CacheSource {
    self.source
  }

  /// Records in presentation order.
  pub fn records(&self) -> impl Iterator<Item = &Record> {
    self.order.iter().map(|&i| &self.page.records[i])
  }

  /// Records in presentation order, minus any carrying a blacklisted tag.
  pub fn visible_records<'a>(
    &'a self,
    blacklist: &'a [String],
  ) -> impl Iterator<Item = &'a Record> + 'a {
    self.records().filter(move |r| !r.has_any_tag(blacklist))
  }

  /// Record at a position in presentation order.
  pub fn record(&self, index: usize) -> Option<&Record> {
    self.order.get(index).map(|&i| &self.page.records[i])
  }

  /// Whether both views share the same cached page.
  pub fn same_page(&self, other: &PageView) -> bool {
    Arc::ptr_eq(&self.page, &other.page)
  }
}

#[derive(Debug, Default)]
struct NavState {
  query: Option<String>,
  epoch: u64,
  /// max_page of the most recently loaded page, 0 when unknown
  max_page: u32,
  sort: SortOrder,
}

/// Clears the in-flight flag when the fetch ends, however it ends.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

pub struct Navigator<P: PostSource, S: PageStorage> {
  source: P,
  cache: PageCache<S>,
  session: Arc<SessionStore>,
  state: Mutex<NavState>,
  fetching: AtomicBool,
}

impl<P: PostSource, S: PageStorage> Navigator<P, S> {
  pub fn new(source: P, cache: PageCache<S>, session: Arc<SessionStore>) -> Self {
    Self {
      source,
      cache,
      session,
      state: Mutex::new(NavState::default()),
      fetching: AtomicBool::new(false),
    }
  }

  pub fn with_sort_order(self, sort: SortOrder) -> Self {
    self.set_sort_order(sort);
    self
  }

  /// Order applied to every page returned from now on.
  pub fn set_sort_order(&self, sort: SortOrder) {
    self.state().sort = sort;
  }

  pub fn query(&self) -> Option<String> {
    self.state().query.clone()
  }

  /// max_page of the most recently loaded page, 0 before any page loads.
  pub fn max_page(&self) -> u32 {
    self.state().max_page
  }

  pub fn is_busy(&self) -> bool {
    self.fetching.load(Ordering::Acquire)
  }

  pub fn session(&self) -> &SessionStore {
    &self.session
  }

  /// Adopt the query of the stored session without loading anything.
  ///
  /// Switching to a different query drops the in-memory views.
  pub fn adopt_session(&self) -> Option<Session> {
    let session = self.session.snapshot()?;
    let changed = {
      let mut state = self.state();
      if state.query.as_deref() == Some(session.query.as_str()) {
        false
      } else {
        state.query = Some(session.query.clone());
        state.epoch += 1;
        state.max_page = 0;
        true
      }
    };
    if changed {
      self.cache.reset(&session.query);
    }
    Some(session)
  }

  /// Reopen the stored session at its last viewed page.
  ///
  /// Returns `None` when there is no session to resume. A page recorded as
  /// fetched is restored from the snapshot store when a fresh snapshot exists,
  /// otherwise it is fetched again and its status reconciled.
  pub async fn resume(&self) -> Result<Option<PageView>, NavError> {
    let Some(session) = self.adopt_session() else {
      return Ok(None);
    };
    self.get_page(session.resume_page()).await.map(Some)
  }

  /// Commit a new query: fetch its first page and, only if that succeeds,
  /// replace the session and drop every cached page.
  pub async fn search(&self, query: &str) -> Result<PageView, NavError> {
    let query = query.trim();
    if query.is_empty() {
      return Err(NavError::EmptyQuery);
    }

    let page = {
      let _guard = self.begin_fetch()?;
      info!(query, "searching");
      self
        .source
        .fetch_page(query, 1)
        .await
        .map_err(|source| NavError::FetchFailed { page: 1, source })?
    };

    let sort = {
      let mut state = self.state();
      state.query = Some(query.to_string());
      state.epoch += 1;
      state.max_page = page.max_page;
      state.sort
    };

    self.cache.reset(query);
    let page = self.cache.insert(page);
    log_persist(self.session.start_new(query, 1).await);

    Ok(PageView::new(page, CacheSource::Network, sort))
  }

  /// Page `n` of the current query.
  pub async fn get_page(&self, n: u32) -> Result<PageView, NavError> {
    if n == 0 {
      return Err(NavError::InvalidPage(n));
    }

    // A restored snapshot is promoted into memory, so look up under the lock
    let (query, epoch, hit) = {
      let state = self.state();
      let query = state.query.clone().ok_or(NavError::NoActiveQuery)?;
      let hit = self.cache.lookup(&query, n);
      (query, state.epoch, hit)
    };

    let result = match hit {
      Some(hit) => hit,
      None => {
        let page = self.fetch_remote(&query, n, epoch).await?;
        CacheResult::from_network(self.commit(page, epoch)?)
      }
    };

    self.finish(n, result, epoch).await
  }

  /// The page after `current`, or `NoMorePages` on the last page.
  pub async fn next(&self, current: u32) -> Result<Navigation, NavError> {
    let max_page = self.max_page();
    if max_page != 0 && current >= max_page {
      return Ok(Navigation::NoMorePages);
    }
    let Some(n) = current.checked_add(1) else {
      return Ok(Navigation::NoMorePages);
    };
    self.get_page(n).await.map(Navigation::Page)
  }

  /// The page before `current`, or `NoMorePages` on the first page.
  pub async fn previous(&self, current: u32) -> Result<Navigation, NavError> {
    if current <= 1 {
      return Ok(Navigation::NoMorePages);
    }
    self.get_page(current - 1).await.map(Navigation::Page)
  }

  async fn fetch_remote(&self, query: &str, n: u32, epoch: u64) -> Result<Page, NavError> {
    let _guard = self.begin_fetch()?;

    log_persist(self.session.record_page_status(n, PageStatus::Pending).await);
    info!(query, page = n, "fetching page");

    match self.source.fetch_page(query, n).await {
      Ok(page) if self.epoch() == epoch => Ok(page),
      Ok(_) => {
        info!(page = n, "dropping result for a superseded query");
        Err(NavError::Superseded { page: n })
      }
      Err(source) => {
        warn!(page = n, error = %source, "page fetch failed");
        if self.epoch() == epoch {
          log_persist(self.session.record_page_status(n, PageStatus::Failed).await);
        }
        Err(NavError::FetchFailed { page: n, source })
      }
    }
  }

  /// Cache a fetched page unless the query changed since `epoch`.
  ///
  /// Check and insert run under the state lock. Query changes bump the epoch
  /// under the same lock before resetting the cache.
  fn commit(&self, page: Page, epoch: u64) -> Result<Arc<Page>, NavError> {
    let state = self.state();
    if state.epoch != epoch {
      info!(page = page.page_number, "dropping result for a superseded query");
      return Err(NavError::Superseded {
        page: page.page_number,
      });
    }
    Ok(self.cache.insert(page))
  }

  async fn finish(
    &self,
    n: u32,
    result: CacheResult<Arc<Page>>,
    epoch: u64,
  ) -> Result<PageView, NavError> {
    if let Some(cached_at) = result.cached_at {
      info!(page = n, %cached_at, "restored page from a previous run");
    }
    let sort = {
      let mut state = self.state();
      if state.epoch != epoch {
        return Err(NavError::Superseded { page: n });
      }
      state.max_page = result.data.max_page;
      state.sort
    };

    let persisted = match result.source {
      CacheSource::Memory => self.session.set_last_viewed(n).await,
      // Restored and fetched pages both reconcile the recorded status
      CacheSource::Network | CacheSource::Disk => self.session.record_visit(n).await,
    };
    log_persist(persisted);

    Ok(PageView::new(result.data, result.source, sort))
  }

  fn begin_fetch(&self) -> Result<FetchGuard<'_>, NavError> {
    self
      .fetching
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .map_err(|_| NavError::Busy)?;
    Ok(FetchGuard(&self.fetching))
  }

  fn epoch(&self) -> u64 {
    self.state().epoch
  }

  fn state(&self) -> MutexGuard<'_, NavState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Session writes never fail navigation; the session keeps working in memory.
fn log_persist(result: Result<(), SessionError>) {
  match result {
    Ok(()) | Err(SessionError::NoActiveSession) => {}
    Err(e) => warn!(error = %e, "session not saved"),
  }
}
