//! Blob storage for CHS Archive.
//!
//! Objects live in a single flat directory, one file per identifier:
//! ```text
//! {root}/
//! ├── .incoming/                                   (staging, never listed)
//! ├── 3f1c...e9a0-report.txt
//! └── 8b02...41d7-photo.png
//! ```
//! The directory listing is the catalog; there is no index file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use sha2::{Digest, Sha256};

use crate::{ArchiveError, Result};

/// Name of the staging directory for in-progress writes.
const STAGING_DIR: &str = ".incoming";

/// Size and access time of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last time the object was read.
    pub last_access: SystemTime,
}

/// One entry yielded by [`BlobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Object identifier.
    pub id: String,
    /// Last time the object was read.
    pub last_access: SystemTime,
}

/// An opened object, ready to be streamed.
#[derive(Debug)]
pub struct StoredFile {
    /// Open handle positioned at the start of the content.
    pub file: File,
    /// Size in bytes at open time.
    pub size_bytes: u64,
}

/// Aggregate storage usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    /// Number of stored objects.
    pub objects: u64,
    /// Total bytes across all objects.
    pub bytes: u64,
}

/// Flat-directory blob store keyed by identifier.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// Staging files left behind by an interrupted write are removed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store = Self { root };
        fs::create_dir_all(store.staging_dir())?;
        store.purge_staging()?;
        Ok(store)
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` under `id` and return its size.
    ///
    /// The bytes are written to a staging file and renamed into place, so a
    /// failed or interrupted write never leaves a partial object visible.
    pub fn put(&self, id: &str, content: &[u8]) -> Result<u64> {
        let target = self.object_path(id)?;
        let staging_dir = self.staging_dir();
        fs::create_dir_all(&staging_dir)?;

        let nonce: u64 = rand::random();
        let staging = staging_dir.join(format!("{id}.{nonce:016x}.part"));

        let written = Self::write_staged(&staging, content)
            .and_then(|()| fs::rename(&staging, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        tracing::debug!(id, size = content.len(), "Stored object");
        Ok(content.len() as u64)
    }

    fn write_staged(path: &Path, content: &[u8]) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content)?;
        file.sync_all()
    }

    /// Open an object for reading and mark it as accessed.
    ///
    /// This is a single open attempt; a missing object (including one deleted
    /// concurrently by the sweeper) yields `NotFound`.
    pub fn get(&self, id: &str) -> Result<StoredFile> {
        let path = self.object_path(id)?;
        let file = File::open(&path).map_err(|e| Self::map_not_found(e, id))?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(Self::not_found(id));
        }

        Self::record_access(
            id,
            filetime::set_file_handle_times(&file, Some(FileTime::now()), None),
        );

        Ok(StoredFile {
            file,
            size_bytes: metadata.len(),
        })
    }

    /// A failed atime update (say EPERM on a file owned by another user)
    /// still serves the bytes; the object just ages as if unread.
    fn record_access(id: &str, touched: io::Result<()>) -> bool {
        match touched {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id, error = %e, "Could not update last access time");
                false
            }
        }
    }

    /// Size and last access time of an object.
    pub fn stat(&self, id: &str) -> Result<ObjectStat> {
        let path = self.object_path(id)?;
        let metadata = fs::metadata(&path).map_err(|e| Self::map_not_found(e, id))?;
        if !metadata.is_file() {
            return Err(Self::not_found(id));
        }

        Ok(ObjectStat {
            size_bytes: metadata.len(),
            last_access: metadata.accessed()?,
        })
    }

    /// Hex-encoded SHA-256 of the object's current contents.
    ///
    /// Recomputed on every call.
    pub fn hash(&self, id: &str) -> Result<String> {
        let path = self.object_path(id)?;
        let mut file = File::open(&path).map_err(|e| Self::map_not_found(e, id))?;
        if !file.metadata()?.is_file() {
            return Err(Self::not_found(id));
        }

        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Enumerate stored objects with their last access time.
    ///
    /// The iterator is lazy and reflects the directory as it is read; call
    /// `list` again to restart. Staging files, hidden entries and anything
    /// that is not a regular file are skipped.
    pub fn list(&self) -> Result<impl Iterator<Item = Result<StoredEntry>>> {
        let entries = fs::read_dir(&self.root)?;

        Ok(entries.filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let id = entry.file_name().into_string().ok()?;
            if !is_valid_id(&id) {
                return None;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                // Deleted between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
                Err(e) => return Some(Err(e.into())),
            };
            if !metadata.is_file() {
                return None;
            }
            Some(
                metadata
                    .accessed()
                    .map(|last_access| StoredEntry { id, last_access })
                    .map_err(ArchiveError::from),
            )
        }))
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it didn't exist.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let path = self.object_path(id)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Count objects and total bytes.
    pub fn usage(&self) -> Result<StorageUsage> {
        let mut usage = StorageUsage::default();
        for entry in self.list()? {
            let entry = entry?;
            match self.stat(&entry.id) {
                Ok(stat) => {
                    usage.objects += 1;
                    usage.bytes += stat.size_bytes;
                }
                Err(ArchiveError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(usage)
    }

    /// Full path of an object, after validating the identifier.
    ///
    /// An invalid identifier is reported as `NotFound`: nothing could ever
    /// have been stored under it.
    pub fn object_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(Self::not_found(id));
        }
        Ok(self.root.join(id))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn purge_staging(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(self.staging_dir())?.flatten() {
            let path = entry.path();
            if path.is_file() && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Removed incomplete uploads from staging");
        }
        Ok(removed)
    }

    fn not_found(id: &str) -> ArchiveError {
        ArchiveError::NotFound(format!("File: {id}"))
    }

    fn map_not_found(e: io::Error, id: &str) -> ArchiveError {
        if e.kind() == io::ErrorKind::NotFound {
            Self::not_found(id)
        } else {
            e.into()
        }
    }
}

/// Check that `id` names a plain entry directly under the store root.
///
/// Rejects empty ids, path separators, NUL, `.`/`..` and hidden names (which
/// would collide with the staging directory).
fn is_valid_id(id: &str) -> bool {
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\', '\0']) {
        return false;
    }

    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
