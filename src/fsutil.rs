//! Filesystem helpers shared by the session store, settings and download cache.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling temp path in the same directory, so the final rename stays on one
/// filesystem.
pub fn temp_path_for(path: &Path) -> PathBuf {
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
  path.with_file_name(format!(".{}.{}.{}.part", name, std::process::id(), n))
}

/// Write `bytes` to `path` so readers only ever see the old or the new file.
///
/// Writes a temp file next to the target, syncs it and renames it over the
/// target. Parent directories are created on demand.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      tokio::fs::create_dir_all(parent).await?;
    }
  }

  let tmp = temp_path_for(path);
  let result = async {
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await
  }
  .await;

  if result.is_err() {
    let _ = tokio::fs::remove_file(&tmp).await;
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[tokio::test]
  async fn test_write_atomic_creates_parents_and_replaces() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("file.json");

    write_atomic(&path, b"one").await.unwrap();
    write_atomic(&path, b"two").await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"two");
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
      .unwrap()
      .filter_map(|e| e.ok())
      .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
      .collect();
    assert!(leftovers.is_empty());
  }

  #[test]
  fn test_temp_paths_are_unique_siblings() {
    let path = Path::new("/tmp/x/posts.json");
    let a = temp_path_for(path);
    let b = temp_path_for(path);
    assert_ne!(a, b);
    assert_eq!(a.parent(), path.parent());
  }
}
