//! CHS Archive - fast and simple file hosting.
//!
//! Upload a file over HTTP, share the returned link, download it later.
//! Files that nobody has downloaded for a while are swept away.

pub mod config;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use config::Config;
pub use error::{ArchiveError, Result};
pub use file::{BlobStore, FileService, RetentionSweeper};
pub use web::ArchiveServer;
