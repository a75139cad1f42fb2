use crate::api::types::{MediaVariant, Record};

/// Quality tier used to pick a media variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quality {
  Low,
  Medium,
  #[default]
  High,
}

/// A concrete media file for a record.
///
/// An empty `url` means no media is available at the chosen tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMedia {
  pub url: String,
  pub width: u32,
  pub height: u32,
}

impl ResolvedMedia {
  pub fn is_available(&self) -> bool {
    !self.url.is_empty()
  }
}

impl From<&MediaVariant> for ResolvedMedia {
  fn from(variant: &MediaVariant) -> Self {
    Self {
      url: variant.url.clone().unwrap_or_default(),
      width: variant.width,
      height: variant.height,
    }
  }
}

/// Pick the variant of `record` to show or download.
///
/// Videos fall back from 480p (Low) or 720p then 480p (Medium) to the original
/// file; High always uses the original. Images map Low, Medium and High to the
/// preview, sample and original respectively.
pub fn resolve(record: &Record, quality: Quality, is_video: bool) -> ResolvedMedia {
  let variant = if is_video {
    let alternates = record.video_alternates.as_ref();
    let q480 = alternates.and_then(|a| usable(a.q480.as_ref()));
    let q720 = alternates.and_then(|a| usable(a.q720.as_ref()));
    match quality {
      Quality::Low => q480,
      Quality::Medium => q720.or(q480),
      Quality::High => None,
    }
    .unwrap_or(&record.file)
  } else {
    match quality {
      Quality::Low => &record.preview,
      Quality::Medium => &record.sample,
      Quality::High => &record.file,
    }
  };
  ResolvedMedia::from(variant)
}

/// An alternate only counts when it carries a URL.
fn usable(variant: Option<&MediaVariant>) -> Option<&MediaVariant> {
  variant.filter(|v| v.url.as_deref().is_some_and(|u| !u.is_empty()))
}

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Human readable size with up to two decimals, e.g. `1.5 MB`.
///
/// Sizes up to and including 1024 stay in bytes.
pub fn format_bytes(bytes: u64) -> String {
  if bytes <= 1024 {
    return format!("{bytes} B");
  }

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }

  let formatted = format!("{value:.2}");
  let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
  format!("{trimmed} {}", SIZE_UNITS[unit])
}
