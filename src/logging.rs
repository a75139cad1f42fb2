use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter, e.g. `postview=debug`.
pub const LOG_ENV: &str = "POSTVIEW_LOG";

const LOG_FILE: &str = "postview.log";

/// Send all log output to `<log_dir>/postview.log`.
///
/// Stdout is left to command output. Keep the returned guard alive until the
/// process exits, dropping it flushes the writer.
pub fn init_logging(log_dir: &Path) -> color_eyre::Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)?;

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false),
    )
    .try_init()?;

  Ok(guard)
}
