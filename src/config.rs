use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::api::types::SortOrder;
use crate::error::ConfigError;
use crate::fsutil;

/// Default naming scheme for downloaded media.
pub const DEFAULT_NAME_SCHEME: &str = "{artist}-{id}{ext}";

const DEFAULT_PAGE_STALE_MINUTES: i64 = 60;

/// User settings, loaded once and passed to every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Presentation order of records, see [`SortOrder::from_index`]
  pub sort_index: usize,
  pub username: Option<String>,
  pub api_key: Option<String>,

  // Viewer toggles. Not used by the core but kept so saving never drops them.
  pub hide_to_tray: bool,
  pub autoplay_videos: bool,
  pub automute_videos: bool,

  pub auto_download_images: bool,
  pub auto_download_videos: bool,

  /// Store session, page cache and media below `custom_path`
  pub use_custom_path: bool,
  pub custom_path: Option<PathBuf>,
  /// Template for media file names, relative to the storage root
  pub name_scheme: String,
  /// Tags hidden from listings (case-insensitive)
  #[serde(deserialize_with = "deserialize_lowercase_vec")]
  pub blacklisted_tags: Vec<String>,

  /// Base URL of the posts API
  pub api_url: String,
  /// Records requested per page
  pub page_limit: u32,
  /// Restore pages recorded as fetched from the page snapshot store
  pub restore_pages: bool,
  /// Snapshots older than this are fetched again
  pub page_stale_minutes: i64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      sort_index: 0,
      username: None,
      api_key: None,
      hide_to_tray: true,
      autoplay_videos: true,
      automute_videos: true,
      auto_download_images: true,
      auto_download_videos: true,
      use_custom_path: false,
      custom_path: None,
      name_scheme: DEFAULT_NAME_SCHEME.to_string(),
      blacklisted_tags: Vec::new(),
      api_url: "https://e621.net".to_string(),
      page_limit: 75,
      restore_pages: true,
      page_stale_minutes: DEFAULT_PAGE_STALE_MINUTES,
    }
  }
}

fn deserialize_lowercase_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.trim().to_lowercase()).collect())
}

/// Login name and API key passed through to the posts API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub api_key: String,
}

impl Settings {
  /// Load settings from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./postview.json (current directory)
  /// 3. $XDG_CONFIG_HOME/postview/settings.json
  ///
  /// A missing default file yields defaults. A malformed file is logged and
  /// replaced by defaults. Returns the settings and the path they belong to.
  pub fn load(explicit_path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
    let path = match explicit_path {
      Some(p) if p.exists() => p.to_path_buf(),
      Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
      None => match Self::find_settings_file() {
        Some(p) => p,
        None => {
          let path = Self::default_path()?;
          debug!(path = %path.display(), "no settings file, using defaults");
          return Ok((Self::default(), path));
        }
      },
    };

    match Self::load_from_path(&path) {
      Ok(settings) => Ok((settings, path)),
      Err(e @ ConfigError::MalformedSettingsFile { .. }) => {
        warn!(error = %e, "ignoring settings file");
        Ok((Self::default(), path))
      }
      Err(e) => Err(e),
    }
  }

  fn find_settings_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("postview.json");
    if local.exists() {
      return Some(local);
    }

    Self::default_path().ok().filter(|p| p.exists())
  }

  fn default_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
      .ok_or(ConfigError::NoDataDir)?;
    Ok(config_dir.join("postview").join("settings.json"))
  }

  pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&contents).map_err(|source| ConfigError::MalformedSettingsFile {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Write settings back to `path`.
  pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
    let data = serde_json::to_vec_pretty(self).map_err(|source| {
      ConfigError::MalformedSettingsFile {
        path: path.to_path_buf(),
        source,
      }
    })?;
    fsutil::write_atomic(path, &data)
      .await
      .map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
      })
  }

  /// Root directory for the session file, page cache, logs and media.
  pub fn storage_root(&self) -> Result<PathBuf, ConfigError> {
    if self.use_custom_path {
      if let Some(custom) = &self.custom_path {
        return Ok(custom.clone());
      }
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(ConfigError::NoDataDir)?;
    Ok(data_dir.join("postview"))
  }

  pub fn sort_order(&self) -> SortOrder {
    SortOrder::from_index(self.sort_index)
  }

  /// Whether viewing a record of this kind downloads it.
  pub fn auto_download(&self, is_video: bool) -> bool {
    if is_video {
      self.auto_download_videos
    } else {
      self.auto_download_images
    }
  }

  /// Snapshot lifetime. Values chrono cannot represent fall back to the default.
  pub fn page_stale_time(&self) -> chrono::Duration {
    chrono::Duration::try_minutes(self.page_stale_minutes.max(0)).unwrap_or_else(|| {
      warn!(
        minutes = self.page_stale_minutes,
        "page_stale_minutes out of range, using default"
      );
      chrono::Duration::minutes(DEFAULT_PAGE_STALE_MINUTES)
    })
  }

  /// Credentials for the posts API.
  ///
  /// POSTVIEW_USERNAME and POSTVIEW_API_KEY override the settings file.
  /// Blank values count as missing.
  pub fn credentials(&self) -> Option<Credentials> {
    let username = std::env::var("POSTVIEW_USERNAME")
      .ok()
      .or_else(|| self.username.clone())
      .filter(|s| !s.trim().is_empty())?;
    let api_key = std::env::var("POSTVIEW_API_KEY")
      .ok()
      .or_else(|| self.api_key.clone())
      .filter(|s| !s.trim().is_empty())?;
    Some(Credentials { username, api_key })
  }
}
