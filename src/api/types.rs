use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File extensions that are played as video rather than shown as an image.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "m4a"];

/// One downloadable rendition of a record (original file, sample or preview).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
  pub url: Option<String>,
  pub ext: Option<String>,
  pub width: u32,
  pub height: u32,
  pub size_bytes: u64,
}

/// Transcoded video renditions offered next to the original file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAlternates {
  pub q720: Option<MediaVariant>,
  pub q480: Option<MediaVariant>,
}

/// Tags grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
  pub artist: Vec<String>,
  pub character: Vec<String>,
  pub species: Vec<String>,
  pub copyright: Vec<String>,
  pub general: Vec<String>,
  pub invalid: Vec<String>,
  pub meta: Vec<String>,
  pub lore: Vec<String>,
}

impl Tags {
  /// Iterate every tag regardless of category.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    [
      &self.artist,
      &self.character,
      &self.species,
      &self.copyright,
      &self.general,
      &self.invalid,
      &self.meta,
      &self.lore,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
  }
}

/// One media item of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub id: u64,
  pub created_at: Option<DateTime<Utc>>,
  pub md5: Option<String>,
  pub rating: String,
  pub score: i64,
  pub fav_count: u64,
  pub file: MediaVariant,
  pub sample: MediaVariant,
  pub preview: MediaVariant,
  pub video_alternates: Option<VideoAlternates>,
  pub tags: Tags,
  pub sources: Vec<String>,
  pub pools: Vec<u64>,
}

impl Record {
  /// Extension of the original file, without a leading dot.
  pub fn ext(&self) -> &str {
    self
      .file
      .ext
      .as_deref()
      .map(|e| e.trim_start_matches('.'))
      .unwrap_or("png")
  }

  /// Whether the original file is a video format.
  pub fn is_video(&self) -> bool {
    let ext = self.ext();
    VIDEO_EXTENSIONS
      .iter()
      .any(|v| v.eq_ignore_ascii_case(ext))
  }

  /// First artist tag, if the record has one.
  pub fn artist(&self) -> Option<&str> {
    self.tags.artist.first().map(String::as_str)
  }

  pub fn has_any_tag(&self, blacklist: &[String]) -> bool {
    if blacklist.is_empty() {
      return false;
    }
    self
      .tags
      .iter()
      .any(|tag| blacklist.iter().any(|b| b.eq_ignore_ascii_case(tag)))
  }
}

/// One fetched page of search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
  pub page_number: u32,
  pub max_page: u32,
  pub query: String,
  pub records: Vec<Record>,
}

impl Page {
  pub fn is_last(&self) -> bool {
    self.page_number >= self.max_page
  }

  /// Indexes into `records` in the given presentation order.
  ///
  /// The page itself is never reordered; callers index through the returned
  /// permutation.
  pub fn order_by(&self, order: SortOrder) -> Vec<usize> {
    let mut indexes: Vec<usize> = (0..self.records.len()).collect();
    let r = &self.records;
    match order {
      SortOrder::Default => {}
      SortOrder::Newest => indexes.sort_by(|&a, &b| r[b].id.cmp(&r[a].id)),
      SortOrder::Oldest => indexes.sort_by(|&a, &b| r[a].id.cmp(&r[b].id)),
      SortOrder::Score => indexes.sort_by(|&a, &b| {
        r[b]
          .score
          .cmp(&r[a].score)
          .then_with(|| r[b].id.cmp(&r[a].id))
      }),
      SortOrder::Favorites => indexes.sort_by(|&a, &b| {
        r[b]
          .fav_count
          .cmp(&r[a].fav_count)
          .then_with(|| r[b].id.cmp(&r[a].id))
      }),
    }
    indexes
  }
}

/// Presentation order for the records of a page, selected by the persisted
/// sort index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
  /// Order returned by the API
  #[default]
  Default,
  Newest,
  Oldest,
  Score,
  Favorites,
}

impl SortOrder {
  pub fn from_index(index: usize) -> Self {
    match index {
      1 => SortOrder::Newest,
      2 => SortOrder::Oldest,
      3 => SortOrder::Score,
      4 => SortOrder::Favorites,
      _ => SortOrder::Default,
    }
  }
}


#[cfg(test)]
mod tests {
  use super::fixtures::*;
  use super::*;

  #[test]
  fn test_video_detection_is_case_insensitive() {
    let mut r = record(1, "fox");
    assert!(!r.is_video());
    r.file.ext = Some("WEBM".to_string());
    assert!(r.is_video());
  }

  #[test]
  fn test_order_by_does_not_touch_records() {
    let mut page = page("cat", 1, 1);
    page.records[0].score = 1;
    page.records[1].score = 10;
    page.records[2].score = 5;
    let before: Vec<u64> = page.records.iter().map(|r| r.id).collect();

    let order = page.order_by(SortOrder::Score);
    assert_eq!(order, vec![1, 2, 0]);

    let after: Vec<u64> = page.records.iter().map(|r| r.id).collect();
    assert_eq!(before, after);
  }

  #[test]
  fn test_newest_and_oldest() {
    let page = page("cat", 2, 3);
    assert_eq!(page.order_by(SortOrder::Newest), vec![2, 1, 0]);
    assert_eq!(page.order_by(SortOrder::Oldest), vec![0, 1, 2]);
  }

  #[test]
  fn test_unknown_sort_index_is_default() {
    assert_eq!(SortOrder::from_index(0), SortOrder::Default);
    assert_eq!(SortOrder::from_index(4), SortOrder::Favorites);
    assert_eq!(SortOrder::from_index(99), SortOrder::Default);
  }

  #[test]
  fn test_blacklist_matches_any_category() {
    let mut r = record(7, "fox");
    r.tags.meta.push("animated".to_string());
    assert!(r.has_any_tag(&["Animated".to_string()]));
    assert!(!r.has_any_tag(&["gore".to_string()]));
    assert!(!r.has_any_tag(&[]));
  }
}
