//! File hosting core for CHS Archive.
//!
//! This module provides the upload/retrieval/cleanup lifecycle:
//! - Identifier generation with sanitized original names
//! - Flat-directory blob storage with atomic writes
//! - In-memory download counters
//! - Retention sweep of idle files
//! - The upload/info/download service tying them together

mod counter;
pub mod identifier;
mod retention;
mod service;
mod storage;

pub use counter::DownloadCounter;
pub use identifier::{generate_id, sanitize_name};
pub use retention::{RetentionSweeper, SweepReport};
pub use service::{format_size, public_url, Download, FileInfo, FileService, UploadedFile};
pub use storage::{BlobStore, ObjectStat, StorageUsage, StoredEntry, StoredFile};

/// Default maximum file size (10MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
