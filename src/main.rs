use clap::{Parser, Subcommand};
use color_eyre::Result;
use postview::{logging, App, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postview")]
#[command(about = "Browse a paginated posts API with a resumable page cache")]
#[command(version)]
struct Args {
  /// Path to settings file (default: $XDG_CONFIG_HOME/postview/settings.json)
  #[arg(short, long)]
  settings: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Start a new search and show its first page
  Search {
    #[arg(required = true, num_args = 1..)]
    tags: Vec<String>,
  },
  /// Show a page of the current search
  Page { number: u32 },
  /// Show the page after the last viewed one
  Next,
  /// Show the page before the last viewed one
  #[command(alias = "previous")]
  Prev,
  /// Reopen the last viewed page (the default)
  Resume,
  /// Show one record of the current page
  View {
    index: usize,
    /// Download the file even when auto download is off
    #[arg(short, long)]
    download: bool,
  },
  /// Download every record of the current page
  Download,
  /// Show the stored session
  Status,
  /// Save API credentials to the settings file
  Login {
    #[arg(long)]
    username: String,
    #[arg(long)]
    api_key: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load settings
  let (settings, settings_path) = Settings::load(args.settings.as_deref())?;
  let root = settings.storage_root()?;
  let _log_guard = logging::init_logging(&root.join("logs"))?;

  let mut app = App::new(settings, settings_path, root).await?;

  match args.command.unwrap_or(Command::Resume) {
    Command::Search { tags } => app.search(&tags.join(" ")).await?,
    Command::Page { number } => app.open_page(number).await?,
    Command::Next => app.next().await?,
    Command::Prev => app.previous().await?,
    Command::Resume => app.resume().await?,
    Command::View { index, download } => app.view(index, download).await?,
    Command::Download => app.download_page().await?,
    Command::Status => app.status(),
    Command::Login { username, api_key } => app.login(username, api_key).await?,
  }

  Ok(())
}
