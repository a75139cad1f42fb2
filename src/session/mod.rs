//! Persisted record of the pages visited for the current query.

mod store;

pub use store::SessionStore;

use serde::{Deserialize, Serialize};

/// Fetch status of a visited page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
  Fetched,
  Failed,
  Pending,
}

impl std::fmt::Display for PageStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      PageStatus::Fetched => "fetched",
      PageStatus::Failed => "failed",
      PageStatus::Pending => "pending",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStatusEntry {
  pub page: u32,
  pub status: PageStatus,
}

/// Session for one query. Entries keep visitation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub query: String,
  pub pages: Vec<PageStatusEntry>,
  /// 0 when no page has been shown yet
  #[serde(rename = "last_page")]
  pub last_viewed_page: u32,
}

impl Session {
  /// A fresh session whose first page was just fetched and shown.
  pub fn new(query: impl Into<String>, first_page: u32) -> Self {
    Self {
      query: query.into(),
      pages: vec![PageStatusEntry {
        page: first_page,
        status: PageStatus::Fetched,
      }],
      last_viewed_page: first_page,
    }
  }

  /// Update the entry for `page` in place, or append one.
  pub fn upsert(&mut self, page: u32, status: PageStatus) {
    match self.pages.iter_mut().find(|e| e.page == page) {
      Some(entry) => entry.status = status,
      None => self.pages.push(PageStatusEntry { page, status }),
    }
  }

  pub fn status_of(&self, page: u32) -> Option<PageStatus> {
    self
      .pages
      .iter()
      .find(|e| e.page == page)
      .map(|e| e.status)
  }

  /// Page to open when resuming.
  pub fn resume_page(&self) -> u32 {
    self.last_viewed_page.max(1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_upsert_is_idempotent() {
    let mut session = Session::new("cat", 1);
    session.upsert(2, PageStatus::Fetched);
    session.upsert(2, PageStatus::Fetched);
    assert_eq!(session.pages.len(), 2);
  }

  #[test]
  fn test_upsert_keeps_visitation_order() {
    let mut session = Session::new("cat", 5);
    session.upsert(2, PageStatus::Pending);
    session.upsert(9, PageStatus::Failed);
    session.upsert(2, PageStatus::Fetched);

    let pages: Vec<u32> = session.pages.iter().map(|e| e.page).collect();
    assert_eq!(pages, vec![5, 2, 9]);
    assert_eq!(session.status_of(2), Some(PageStatus::Fetched));
    assert_eq!(session.status_of(3), None);
  }

  #[test]
  fn test_wire_format() {
    let session: Session = serde_json::from_str(
      r#"{"query":"cat","pages":[{"page":1,"status":"fetched"}],"last_page":1}"#,
    )
    .unwrap();
    assert_eq!(session, Session::new("cat", 1));

    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["last_page"], 1);
    assert_eq!(json["pages"][0]["status"], "fetched");
  }

  #[test]
  fn test_resume_page_defaults_to_first() {
    let mut session = Session::new("cat", 1);
    session.last_viewed_page = 0;
    assert_eq!(session.resume_page(), 1);
  }
}
