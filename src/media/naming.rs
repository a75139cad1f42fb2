//! File naming templates for downloaded media.

use std::path::PathBuf;

use crate::api::types::Record;
use crate::config::DEFAULT_NAME_SCHEME;

/// Characters that may not appear in a value substituted into a file name.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// A template such as `{artist}-{id}{ext}` rendered against a record.
///
/// Recognized tokens: `{artist}` (first artist, `unknown` when none), `{id}`,
/// `{ext}` (with its leading dot), `{md5}`, `{rating}`, `{width}`, `{height}`
/// and `{score}`. Anything else is copied through as written. A `/` in the
/// template itself starts a subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
  template: String,
}

impl Default for NamingScheme {
  fn default() -> Self {
    Self::new(DEFAULT_NAME_SCHEME)
  }
}

impl NamingScheme {
  pub fn new(template: impl Into<String>) -> Self {
    let template = template.into();
    if template.trim().is_empty() {
      return Self::default();
    }
    Self { template }
  }

  pub fn template(&self) -> &str {
    &self.template
  }

  /// Relative path for `record`. Never absolute and never contains `..`.
  pub fn render(&self, record: &Record) -> PathBuf {
    let rendered = self.render_string(record);
    let path: PathBuf = rendered
      .split('/')
      .map(str::trim)
      .filter(|part| !part.is_empty() && *part != "." && *part != "..")
      .collect();

    if path.as_os_str().is_empty() {
      PathBuf::from(format!("{}.{}", record.id, record.ext()))
    } else {
      path
    }
  }

  fn render_string(&self, record: &Record) -> String {
    let mut out = String::with_capacity(self.template.len() + 16);
    let mut rest = self.template.as_str();

    while let Some(start) = rest.find('{') {
      out.push_str(&rest[..start]);
      let after = &rest[start..];
      let Some(end) = after.find('}') else {
        rest = after;
        break;
      };
      let token = &after[1..end];
      match token_value(record, token) {
        Some(value) => out.push_str(&sanitize(&value)),
        None => out.push_str(&after[..=end]),
      }
      rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
  }
}

fn token_value(record: &Record, token: &str) -> Option<String> {
  let value = match token {
    "artist" => record.artist().unwrap_or("unknown").to_string(),
    "id" => record.id.to_string(),
    "ext" => format!(".{}", record.ext()),
    "md5" => record.md5.clone().unwrap_or_default(),
    "rating" => record.rating.clone(),
    "width" => record.file.width.to_string(),
    "height" => record.file.height.to_string(),
    "score" => record.score.to_string(),
    _ => return None,
  };
  Some(value)
}

/// Replace path separators and other reserved characters with `_`.
pub fn sanitize(value: &str) -> String {
  value
    .chars()
    .map(|c| {
      if UNSAFE_CHARS.contains(&c) || c.is_control() {
        '_'
      } else {
        c
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures::record;

  #[test]
  fn test_default_scheme() {
    let r = record(42, "fox");
    assert_eq!(NamingScheme::default().render(&r), PathBuf::from("fox-42.png"));
  }

  #[test]
  fn test_all_tokens() {
    let mut r = record(7, "fox");
    r.score = -3;
    let scheme = NamingScheme::new("{rating}_{score}_{width}x{height}_{md5}{ext}");
    assert_eq!(
      scheme.render(&r),
      PathBuf::from(format!("s_-3_1920x1080_{:032x}.png", 7))
    );
  }

  #[test]
  fn test_missing_artist_is_unknown() {
    let r = record(5, "");
    assert_eq!(
      NamingScheme::default().render(&r),
      PathBuf::from("unknown-5.png")
    );
  }

  #[test]
  fn test_unknown_tokens_pass_through() {
    let r = record(42, "fox");
    let scheme = NamingScheme::new("{pool}-{id}{ext}");
    assert_eq!(scheme.render(&r), PathBuf::from("{pool}-42.png"));

    let unterminated = NamingScheme::new("{id}-{artist");
    assert_eq!(unterminated.render(&r), PathBuf::from("42-{artist"));
  }

  #[test]
  fn test_values_cannot_create_directories() {
    let r = record(1, "ac/dc:live");
    assert_eq!(
      NamingScheme::default().render(&r),
      PathBuf::from("ac_dc_live-1.png")
    );

    let r = record(2, "..");
    assert_eq!(
      NamingScheme::new("{artist}/{id}{ext}").render(&r),
      PathBuf::from("2.png")
    );
  }

  #[test]
  fn test_template_slash_creates_subdirectory() {
    let r = record(42, "fox");
    let scheme = NamingScheme::new("{artist}/{id}{ext}");
    assert_eq!(scheme.render(&r), PathBuf::from("fox").join("42.png"));

    let escaping = NamingScheme::new("/../{id}{ext}");
    assert_eq!(escaping.render(&r), PathBuf::from("42.png"));
  }

  #[test]
  fn test_empty_template_uses_default() {
    assert_eq!(NamingScheme::new("  ").template(), DEFAULT_NAME_SCHEME);
  }
}
