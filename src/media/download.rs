//! Lazily materialized media files.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::naming::NamingScheme;
use super::resolver::ResolvedMedia;
use crate::api::types::Record;
use crate::api::MediaSource;
use crate::error::DownloadError;
use crate::fsutil;

/// Maps records to files below `root` and downloads them on first use.
///
/// An existing file is always trusted and never overwritten. New files are
/// written to a temporary sibling and renamed into place, so a failed
/// download never leaves a partial file at the final path.
pub struct DownloadCache<M: MediaSource> {
  root: PathBuf,
  scheme: NamingScheme,
  source: M,
}

impl<M: MediaSource> DownloadCache<M> {
  pub fn new(root: impl Into<PathBuf>, scheme: NamingScheme, source: M) -> Self {
    Self {
      root: root.into(),
      scheme,
      source,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Where `record` is (or would be) stored.
  pub fn local_path(&self, record: &Record) -> PathBuf {
    self.root.join(self.scheme.render(record))
  }

  /// The local file for `record`, if it has already been downloaded.
  pub async fn existing(&self, record: &Record) -> Option<PathBuf> {
    let path = self.local_path(record);
    exists(&path).await.then_some(path)
  }

  /// Return the local file for `record`, downloading `media` if needed.
  pub async fn ensure_local(
    &self,
    record: &Record,
    media: &ResolvedMedia,
  ) -> Result<PathBuf, DownloadError> {
    let path = self.local_path(record);
    if exists(&path).await {
      debug!(id = record.id, path = %path.display(), "media already on disk");
      return Ok(path);
    }

    if !media.is_available() {
      return Err(DownloadError::NoMedia { id: record.id });
    }

    info!(id = record.id, url = %media.url, "downloading media");
    let bytes = self
      .source
      .fetch_bytes(&media.url)
      .await
      .map_err(|source| DownloadError::Fetch {
        url: media.url.clone(),
        source,
      })?;

    fsutil::write_atomic(&path, &bytes)
      .await
      .map_err(|source| DownloadError::Write {
        path: path.clone(),
        source,
      })?;

    debug!(id = record.id, bytes = bytes.len(), path = %path.display(), "media saved");
    Ok(path)
  }
}

async fn exists(path: &Path) -> bool {
  tokio::fs::try_exists(path).await.unwrap_or(false)
}
