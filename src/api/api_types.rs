//! Serde-deserializable types matching the posts API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{MediaVariant, Page, Record, Tags, VideoAlternates};

// ============================================================================
// Media renditions
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiFile {
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
  pub ext: Option<String>,
  #[serde(default)]
  pub size: u64,
  pub md5: Option<String>,
  pub url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiPreview {
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
  pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlternate {
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
  // Can contain nulls for renditions that were never generated
  #[serde(default)]
  pub urls: Vec<Option<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiAlternates {
  #[serde(rename = "720p")]
  pub q720: Option<ApiAlternate>,
  #[serde(rename = "480p")]
  pub q480: Option<ApiAlternate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiSample {
  #[serde(default)]
  pub has: bool,
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
  pub url: Option<String>,
  pub alternates: Option<ApiAlternates>,
}

// ============================================================================
// Post
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiScore {
  #[serde(default)]
  pub total: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiTags {
  #[serde(default)]
  pub general: Vec<String>,
  #[serde(default)]
  pub artist: Vec<String>,
  #[serde(default)]
  pub copyright: Vec<String>,
  #[serde(default)]
  pub character: Vec<String>,
  #[serde(default)]
  pub species: Vec<String>,
  #[serde(default)]
  pub invalid: Vec<String>,
  #[serde(default)]
  pub meta: Vec<String>,
  #[serde(default)]
  pub lore: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPost {
  pub id: u64,
  pub created_at: Option<String>,
  #[serde(default)]
  pub file: ApiFile,
  #[serde(default)]
  pub preview: ApiPreview,
  #[serde(default)]
  pub sample: ApiSample,
  #[serde(default)]
  pub score: ApiScore,
  #[serde(default)]
  pub tags: ApiTags,
  #[serde(default)]
  pub rating: String,
  #[serde(default)]
  pub fav_count: u64,
  #[serde(default)]
  pub sources: Vec<String>,
  #[serde(default)]
  pub pools: Vec<u64>,
}

// ============================================================================
// Posts endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPostsResponse {
  #[serde(default)]
  pub posts: Vec<ApiPost>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiPostsResponse {
  /// Build a page from the response.
  ///
  /// The endpoint does not report a total, so a full page means "there may be
  /// more, up to the server's page cap" and a short page is the last one.
  pub fn into_page(self, query: &str, page_number: u32, limit: u32, page_cap: u32) -> Page {
    let full = self.posts.len() as u32 >= limit;
    let max_page = if full { page_cap } else { page_number };

    Page {
      page_number,
      max_page: max_page.max(page_number),
      query: query.to_string(),
      records: self.posts.into_iter().map(Record::from).collect(),
    }
  }
}

impl From<ApiAlternate> for MediaVariant {
  fn from(alt: ApiAlternate) -> Self {
    let url = alt.urls.into_iter().flatten().next();
    let ext = url
      .as_deref()
      .and_then(|u| u.rsplit('.').next())
      .map(String::from);
    MediaVariant {
      url,
      ext,
      width: alt.width,
      height: alt.height,
      size_bytes: 0,
    }
  }
}

impl From<ApiPost> for Record {
  fn from(post: ApiPost) -> Self {
    let video_alternates = post.sample.alternates.and_then(|alts| {
      if alts.q720.is_none() && alts.q480.is_none() {
        None
      } else {
        Some(VideoAlternates {
          q720: alts.q720.map(MediaVariant::from),
          q480: alts.q480.map(MediaVariant::from),
        })
      }
    });

    // Posts without a sample serve the original at this tier
    let sample = if post.sample.url.is_none() && !post.sample.has {
      MediaVariant {
        url: post.file.url.clone(),
        ext: post.file.ext.clone(),
        width: post.file.width,
        height: post.file.height,
        size_bytes: post.file.size,
      }
    } else {
      MediaVariant {
        url: post.sample.url,
        ext: None,
        width: post.sample.width,
        height: post.sample.height,
        size_bytes: 0,
      }
    };

    Record {
      id: post.id,
      created_at: post.created_at.as_deref().and_then(parse_timestamp),
      md5: post.file.md5,
      rating: post.rating,
      score: post.score.total,
      fav_count: post.fav_count,
      file: MediaVariant {
        url: post.file.url,
        ext: post.file.ext.clone(),
        width: post.file.width,
        height: post.file.height,
        size_bytes: post.file.size,
      },
      sample,
      preview: MediaVariant {
        url: post.preview.url,
        ext: None,
        width: post.preview.width,
        height: post.preview.height,
        size_bytes: 0,
      },
      video_alternates,
      tags: Tags {
        artist: post.tags.artist,
        character: post.tags.character,
        species: post.tags.species,
        copyright: post.tags.copyright,
        general: post.tags.general,
        invalid: post.tags.invalid,
        meta: post.tags.meta,
        lore: post.tags.lore,
      },
      sources: dedup(post.sources),
      pools: dedup(post.pools),
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Remove repeated values, keeping the first occurrence.
fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
  let mut out: Vec<T> = Vec::with_capacity(values.len());
  for v in values {
    if !out.contains(&v) {
      out.push(v);
    }
  }
  out
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use super::*;

  const VIDEO_POST: &str = r#"{
    "posts": [{
      "id": 42,
      "created_at": "2024-03-01T12:30:00.000-05:00",
      "file": {"width": 1920, "height": 1080, "ext": "webm", "size": 4096, "md5": "abc", "url": "https://static.example/abc.webm"},
      "preview": {"width": 150, "height": 84, "url": "https://static.example/preview/abc.jpg"},
      "sample": {
        "has": true, "width": 850, "height": 478, "url": "https://static.example/sample/abc.jpg",
        "alternates": {
          "720p": {"type": "video", "width": 1280, "height": 720, "urls": ["https://static.example/720/abc.webm", null]},
          "480p": {"type": "video", "width": 640, "height": 360, "urls": [null, "https://static.example/480/abc.mp4"]}
        }
      },
      "score": {"up": 10, "down": -2, "total": 8},
      "tags": {"artist": ["fox"], "general": ["solo"], "meta": ["animated"]},
      "rating": "s",
      "fav_count": 12,
      "sources": ["https://a.example", "https://a.example", "https://b.example"],
      "pools": [3, 3, 4]
    }]
  }"#;

  #[test]
  fn test_video_post_conversion() {
    let resp: ApiPostsResponse = serde_json::from_str(VIDEO_POST).unwrap();
    let page = resp.into_page("cat", 1, 75, 750);

    assert_eq!(page.max_page, 1);
    let record = &page.records[0];
    assert_eq!(record.id, 42);
    assert!(record.is_video());
    assert_eq!(record.score, 8);
    assert_eq!(record.md5.as_deref(), Some("abc"));
    assert_eq!(record.sources.len(), 2);
    assert_eq!(record.pools, vec![3, 4]);
    assert_eq!(
      record.created_at.map(|t| t.to_rfc3339()),
      Some("2024-03-01T17:30:00+00:00".to_string())
    );

    let alts = record.video_alternates.as_ref().unwrap();
    let q720 = alts.q720.as_ref().unwrap();
    assert_eq!(q720.url.as_deref(), Some("https://static.example/720/abc.webm"));
    assert_eq!(q720.height, 720);
    let q480 = alts.q480.as_ref().unwrap();
    assert_eq!(q480.url.as_deref(), Some("https://static.example/480/abc.mp4"));
    assert_eq!(q480.ext.as_deref(), Some("mp4"));
  }

  #[test]
  fn test_full_page_reports_page_cap() {
    let resp: ApiPostsResponse = serde_json::from_str(VIDEO_POST).unwrap();
    let page = resp.into_page("cat", 3, 1, 750);
    assert_eq!(page.page_number, 3);
    assert_eq!(page.max_page, 750);
  }

  #[test]
  fn test_missing_sections_use_defaults() {
    let resp: ApiPostsResponse =
      serde_json::from_str(r#"{"posts": [{"id": 1, "file": {"url": null}}]}"#).unwrap();
    let page = resp.into_page("cat", 2, 75, 750);
    assert_eq!(page.max_page, 2);
    let record = &page.records[0];
    assert!(record.file.url.is_none());
    assert!(record.video_alternates.is_none());
    assert!(record.sample.url.is_none());
  }

  #[test]
  fn test_post_without_sample_keeps_a_medium_tier_url() {
    use crate::media::{resolve, Quality};

    let resp: ApiPostsResponse = serde_json::from_str(
      r#"{"posts": [
        {"id": 1, "file": {"ext": "png", "url": "https://static.example/1.png"},
         "sample": {"has": false, "url": "https://static.example/sample/1.png"}},
        {"id": 2, "file": {"ext": "png", "width": 400, "height": 300, "url": "https://static.example/2.png"},
         "sample": {"has": false, "url": null}}
      ]}"#,
    )
    .unwrap();
    let page = resp.into_page("cat", 1, 75, 750);

    let given = resolve(&page.records[0], Quality::Medium, false);
    assert_eq!(given.url, "https://static.example/sample/1.png");

    let original = resolve(&page.records[1], Quality::Medium, false);
    assert_eq!(original.url, "https://static.example/2.png");
    assert_eq!((original.width, original.height), (400, 300));
  }
}
