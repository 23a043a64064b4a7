//! File service for CHS Archive.
//!
//! This module orchestrates uploads, info lookups and downloads on top of the
//! blob store, and owns the per-file download counters.

use std::fs::File;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::StorageConfig;
use crate::{ArchiveError, Result};

use super::counter::DownloadCounter;
use super::identifier::{self, sanitize_name};
use super::storage::{BlobStore, StorageUsage};
use super::DEFAULT_MAX_FILE_SIZE;

/// Extensions rendered with an inline preview on the info page.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Generated identifier.
    pub id: String,
    /// Sanitized original filename.
    pub original_name: String,
    /// Stored size in bytes.
    pub size_bytes: u64,
    /// Public link to the info page.
    pub url: String,
}

/// Metadata about a stored file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Identifier.
    pub id: String,
    /// Sanitized original filename.
    pub original_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Human-readable size (KB/MB/GB).
    pub size_display: String,
    /// Hex SHA-256 of the content.
    pub content_hash: String,
    /// Downloads since the process started.
    pub downloads: u64,
    /// Last time the file was downloaded.
    pub last_access: SystemTime,
    /// Whether the file can be previewed as an image.
    pub is_image: bool,
}

/// An opened download.
#[derive(Debug)]
pub struct Download {
    /// Open handle to the content.
    pub file: File,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Name the client should save the file as.
    pub filename: String,
    /// MIME type guessed from the filename.
    pub content_type: String,
}

/// File service for managing uploads and downloads.
///
/// The download counters belong to this service and are reset when the
/// process restarts.
#[derive(Debug)]
pub struct FileService {
    store: BlobStore,
    counter: Arc<DownloadCounter>,
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl FileService {
    /// Create a new FileService accepting any extension up to the default size.
    pub fn new(store: BlobStore) -> Self {
        Self {
            store,
            counter: Arc::new(DownloadCounter::new()),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: Vec::new(),
        }
    }

    /// Create a FileService from storage configuration.
    pub fn from_config(store: BlobStore, config: &StorageConfig) -> Self {
        Self::new(store)
            .with_max_file_size(config.max_upload_size_bytes())
            .with_allowed_extensions(config.allowed_extensions.iter().cloned())
    }

    /// Download counters, shared with the retention sweeper so deleted
    /// objects drop their counts.
    pub fn counter(&self) -> Arc<DownloadCounter> {
        self.counter.clone()
    }

    /// Set a custom max file size.
    pub fn with_max_file_size(mut self, max_size: u64) -> Self {
        self.max_file_size = max_size;
        self
    }

    /// Restrict uploads to the given extensions. An empty list allows all.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Store an upload and build its public link.
    ///
    /// # Validation
    /// - File size: max configured size (default 10MB)
    /// - Extension: must be in the allow-list, when one is configured
    pub fn upload(
        &self,
        content: &[u8],
        original_name: &str,
        base_url: &str,
    ) -> Result<UploadedFile> {
        self.check_size(content.len() as u64)?;
        self.check_extension(original_name)?;

        let id = identifier::generate_id(original_name);
        let size_bytes = self.store.put(&id, content)?;
        let url = public_url(base_url, &id);

        tracing::info!(id = %id, size = size_bytes, "File uploaded");

        Ok(UploadedFile {
            original_name: sanitize_name(original_name),
            id,
            size_bytes,
            url,
        })
    }

    /// Reject content larger than the configured maximum.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(self.size_limit_error());
        }
        Ok(())
    }

    /// Error reported for content over the size limit.
    ///
    /// Whole-megabyte limits read `max 10MB`; anything else is spelled out so
    /// a sub-megabyte limit never rounds down to zero.
    pub fn size_limit_error(&self) -> ArchiveError {
        const MB: u64 = 1024 * 1024;
        let max = match self.max_file_size {
            n if n >= MB && n % MB == 0 => format!("{}MB", n / MB),
            n if n < 1024 => format!("{n} bytes"),
            n => format_size(n),
        };
        ArchiveError::Validation(format!("File too large (max {max})"))
    }

    fn check_extension(&self, original_name: &str) -> Result<()> {
        if self.allowed_extensions.is_empty() {
            return Ok(());
        }

        let allowed = extension(original_name)
            .map(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
            .unwrap_or(false);
        if !allowed {
            return Err(ArchiveError::Validation(format!(
                "File type not allowed (allowed: {})",
                self.allowed_extensions.join(", ")
            )));
        }
        Ok(())
    }

    /// Look up metadata for a stored file.
    pub fn info(&self, id: &str) -> Result<FileInfo> {
        let stat = self.store.stat(id)?;
        let content_hash = self.store.hash(id)?;
        let original_name = name_for_id(id);

        Ok(FileInfo {
            id: id.to_string(),
            is_image: is_image(&original_name),
            original_name,
            size_bytes: stat.size_bytes,
            size_display: format_size(stat.size_bytes),
            content_hash,
            downloads: self.counter.get(id),
            last_access: stat.last_access,
        })
    }

    /// Open a file for download and count it.
    ///
    /// The client-facing filename is `display_name` when given and non-empty,
    /// otherwise the stored original name.
    pub fn download(&self, id: &str, display_name: Option<&str>) -> Result<Download> {
        let stored = self.store.get(id)?;
        let downloads = self.counter.increment(id);

        let filename = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name_for_id(id));
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!(id, downloads, "File downloaded");

        Ok(Download {
            file: stored.file,
            size_bytes: stored.size_bytes,
            filename,
            content_type,
        })
    }

    /// Current download count for `id`.
    pub fn download_count(&self, id: &str) -> u64 {
        self.counter.get(id)
    }

    /// Aggregate storage usage.
    pub fn usage(&self) -> Result<StorageUsage> {
        self.store.usage()
    }

    /// Get the storage used by this service.
    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    /// Get the configured max file size.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

/// Build the public info-page link for `id`.
pub fn public_url(base_url: &str, id: &str) -> String {
    format!("{}/file/{id}", base_url.trim_end_matches('/'))
}

/// Format a byte count with the largest fitting unit (KB, MB or GB).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} KB", bytes / KB)
    }
}

/// Human-readable name for an identifier, falling back to the id itself.
fn name_for_id(id: &str) -> String {
    identifier::original_name(id).unwrap_or(id).to_string()
}

/// Lowercased extension after the last `.`, if any.
fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

fn is_image(name: &str) -> bool {
    extension(name)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
