use color_eyre::{eyre::eyre, Result};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::types::Record;
use crate::api::PostsClient;
use crate::cache::{CacheSource, NoopStorage, PageCache, PageStorage, SqliteStorage};
use crate::config::Settings;
use crate::media::{format_bytes, resolve, DownloadCache, NamingScheme, Quality};
use crate::navigator::{Navigation, Navigator, PageView};
use crate::session::SessionStore;

/// Every view and download uses the original file.
const QUALITY: Quality = Quality::High;

/// Parallel media downloads for `download`
const DOWNLOAD_CONCURRENCY: usize = 4;

const SESSION_FILE: &str = "posts.json";
const PAGE_DB_FILE: &str = "pages.db";

/// Wires the settings into each component and implements the CLI commands.
pub struct App {
  settings: Settings,
  settings_path: PathBuf,
  navigator: Navigator<PostsClient, Box<dyn PageStorage>>,
  downloads: DownloadCache<PostsClient>,
}

impl App {
  pub async fn new(settings: Settings, settings_path: PathBuf, root: PathBuf) -> Result<Self> {
    let client = PostsClient::new(&settings)?;

    let session = Arc::new(SessionStore::open(root.join(SESSION_FILE)).await);

    let storage: Box<dyn PageStorage> = if settings.restore_pages {
      match SqliteStorage::open(&root.join(PAGE_DB_FILE)) {
        Ok(storage) => Box::new(storage),
        Err(e) => {
          warn!(error = %e, "page snapshots disabled");
          Box::new(NoopStorage)
        }
      }
    } else {
      Box::new(NoopStorage)
    };
    let cache = PageCache::new(storage)
      .with_stale_time(settings.page_stale_time())
      .with_restore(settings.restore_pages);

    let navigator =
      Navigator::new(client.clone(), cache, session).with_sort_order(settings.sort_order());
    let downloads = DownloadCache::new(root, NamingScheme::new(&settings.name_scheme), client);

    Ok(Self {
      settings,
      settings_path,
      navigator,
      downloads,
    })
  }

  /// Start a new search and show its first page.
  pub async fn search(&self, query: &str) -> Result<()> {
    let view = self.navigator.search(query).await?;
    self.print_page(&view);
    Ok(())
  }

  /// Reopen the last viewed page of the stored session.
  pub async fn resume(&self) -> Result<()> {
    match self.navigator.resume().await? {
      Some(view) => self.print_page(&view),
      None => println!("No session yet. Start one with `postview search <tags>`."),
    }
    Ok(())
  }

  pub async fn open_page(&self, n: u32) -> Result<()> {
    self
      .navigator
      .adopt_session()
      .ok_or_else(|| eyre!("No active search. Run `postview search <tags>` first"))?;
    let view = self.navigator.get_page(n).await?;
    self.print_page(&view);
    Ok(())
  }

  pub async fn next(&self) -> Result<()> {
    let current = self.current_page().await?;
    match self.navigator.next(current.number()).await? {
      Navigation::Page(view) => self.print_page(&view),
      Navigation::NoMorePages => println!("Already on the last page ({}).", current.number()),
    }
    Ok(())
  }

  pub async fn previous(&self) -> Result<()> {
    let current = self.current_page().await?;
    match self.navigator.previous(current.number()).await? {
      Navigation::Page(view) => self.print_page(&view),
      Navigation::NoMorePages => println!("Already on the first page."),
    }
    Ok(())
  }

  /// Show one record of the current page.
  ///
  /// The record is downloaded when `download` is set or the auto download
  /// setting for its kind is on. A failed download falls back to the remote URL.
  pub async fn view(&self, index: usize, download: bool) -> Result<()> {
    let page = self.current_page().await?;
    let record = page
      .record(index)
      .ok_or_else(|| eyre!("No record at index {} on page {}", index, page.number()))?;

    let is_video = record.is_video();
    let media = resolve(record, QUALITY, is_video);

    println!("#{} by {}", record.id, record.artist().unwrap_or("unknown"));
    println!(
      "{} x {} | {} | {}",
      media.width,
      media.height,
      record.ext(),
      format_bytes(record.file.size_bytes)
    );
    println!("rating {} | score {} | favorites {}", record.rating, record.score, record.fav_count);
    if !record.sources.is_empty() {
      println!("sources: {}", record.sources.join(" "));
    }
    if !record.pools.is_empty() {
      let pools: Vec<String> = record.pools.iter().map(u64::to_string).collect();
      println!("pools: {}", pools.join(" "));
    }

    if download || self.settings.auto_download(is_video) {
      match self.downloads.ensure_local(record, &media).await {
        Ok(path) => println!("file: {}", path.display()),
        Err(e) => {
          warn!(id = record.id, error = %e, "download failed");
          println!("download failed: {e}");
          print_remote(&media.url);
        }
      }
    } else if let Some(path) = self.downloads.existing(record).await {
      println!("file: {}", path.display());
    } else {
      print_remote(&media.url);
    }
    Ok(())
  }

  /// Download every visible record of the current page.
  pub async fn download_page(&self) -> Result<()> {
    let page = self.current_page().await?;
    let records: Vec<&Record> = page
      .visible_records(&self.settings.blacklisted_tags)
      .collect();
    info!(page = page.number(), count = records.len(), "downloading page");

    let results: Vec<_> = stream::iter(records)
      .map(|record| async move {
        let media = resolve(record, QUALITY, record.is_video());
        (record.id, self.downloads.ensure_local(record, &media).await)
      })
      .buffer_unordered(DOWNLOAD_CONCURRENCY)
      .collect()
      .await;

    let mut failed = 0;
    for (id, result) in &results {
      if let Err(e) = result {
        failed += 1;
        println!("#{id}: {e}");
      }
    }
    println!(
      "{} of {} files in {}",
      results.len() - failed,
      results.len(),
      self.downloads.root().display()
    );
    Ok(())
  }

  /// Print the stored session without loading any page.
  pub fn status(&self) {
    let Some(session) = self.navigator.session().snapshot() else {
      println!("No session.");
      return;
    };

    println!("query: {}", session.query);
    println!("last viewed page: {}", session.last_viewed_page);
    for entry in &session.pages {
      println!("  page {:>4}  {}", entry.page, entry.status);
    }
    println!("session file: {}", self.navigator.session().path().display());
  }

  /// Store API credentials in the settings file.
  pub async fn login(&mut self, username: String, api_key: String) -> Result<()> {
    self.settings.username = Some(username);
    self.settings.api_key = Some(api_key);
    self.settings.save(&self.settings_path).await?;
    println!("Credentials saved to {}", self.settings_path.display());
    Ok(())
  }

  async fn current_page(&self) -> Result<PageView> {
    self
      .navigator
      .resume()
      .await?
      .ok_or_else(|| eyre!("No active search. Run `postview search <tags>` first"))
  }

  fn print_page(&self, view: &PageView) {
    let source = match view.source() {
      CacheSource::Network => "fetched",
      CacheSource::Memory => "cached",
      CacheSource::Disk => "restored",
    };
    let last = if view.page().is_last() { " (last)" } else { "" };
    println!(
      "{} | page {} of {}{} | {}",
      view.page().query,
      view.number(),
      view.max_page(),
      last,
      source
    );

    let mut hidden = 0;
    for (index, record) in view.records().enumerate() {
      if record.has_any_tag(&self.settings.blacklisted_tags) {
        hidden += 1;
        continue;
      }
      println!(
        "{:>3}  #{:<9} {} {:>6}  {:<24} {:>5} {:>10}",
        index,
        record.id,
        record.rating,
        record.score,
        record.artist().unwrap_or("unknown"),
        record.ext(),
        format_bytes(record.file.size_bytes)
      );
    }
    if hidden > 0 {
      println!("({hidden} hidden by blacklist)");
    }
  }
}

fn print_remote(url: &str) {
  if url.is_empty() {
    println!("no media available");
  } else {
    println!("url: {url}");
  }
}
