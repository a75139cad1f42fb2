//! Media variant selection, file naming and the local download cache.

mod download;
mod naming;
mod resolver;

pub use download::DownloadCache;
pub use naming::NamingScheme;
pub use resolver::{format_bytes, resolve, Quality, ResolvedMedia};
