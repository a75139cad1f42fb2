//! Cached, resumable page navigation over a paginated posts API.
//!
//! [`navigator::Navigator`] serves pages from the [`cache`] and records every
//! visit in the [`session`] store so the last viewed page survives restarts.
//! [`media`] picks a file variant per record and downloads it on demand.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
mod fsutil;
pub mod logging;
pub mod media;
pub mod navigator;
pub mod session;

pub use app::App;
pub use config::Settings;
