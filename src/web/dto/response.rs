//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::file::{FileInfo, StorageUsage, UploadedFile};

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Status message.
    pub message: String,
    /// Generated file identifier.
    pub id: String,
    /// Sanitized original filename.
    pub filename: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Shareable link to the file page.
    pub url: String,
}

impl From<UploadedFile> for UploadResponse {
    fn from(uploaded: UploadedFile) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            id: uploaded.id,
            filename: uploaded.original_name,
            size: uploaded.size_bytes,
            url: uploaded.url,
        }
    }
}

/// File metadata response.
#[derive(Debug, Serialize)]
pub struct FileInfoResponse {
    /// File identifier.
    pub id: String,
    /// Sanitized original filename.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Human-readable size.
    pub size_display: String,
    /// Hex SHA-256 of the content.
    pub sha256: String,
    /// Downloads since the server started.
    pub downloads: u64,
    /// Last access time (RFC 3339).
    pub last_accessed: String,
    /// Download link.
    pub download_url: String,
}

impl From<FileInfo> for FileInfoResponse {
    fn from(info: FileInfo) -> Self {
        let last_accessed = chrono::DateTime::<chrono::Utc>::from(info.last_access).to_rfc3339();
        Self {
            download_url: format!("/download/{}", info.id),
            id: info.id,
            filename: info.original_name,
            size: info.size_bytes,
            size_display: info.size_display,
            sha256: info.content_hash,
            downloads: info.downloads,
            last_accessed,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Process status.
    pub status: &'static str,
    /// Number of stored files.
    pub objects: u64,
    /// Storage usage, e.g. `"1.25MB used"`.
    pub storage: String,
}

impl HealthResponse {
    /// Build a healthy response from storage usage.
    pub fn ok(usage: StorageUsage) -> Self {
        Self {
            status: "OK",
            objects: usage.objects,
            storage: format!("{:.2}MB used", usage.bytes as f64 / 1024.0 / 1024.0),
        }
    }
}
