//! Storage backend and path utilities.
//!
//! This module centralizes all filesystem access for `versioned-dataset-core`.
//! It maps a dataset root to the locations of:
//!
//! - The version log directory (for example, `<root>/_versions/`).
//! - Individual commit files (for example, `<root>/_versions/0000000001.json`).
//! - The `CURRENT` pointer that records the latest committed version.
//! - Data fragments (Parquet files) under `data/`.
//!
//! Higher layers (`transaction_log`, `dataset`) only see relative paths and
//! the small set of async helpers below, so object-storage backends can be
//! added later without touching the log or dataset logic.

pub mod dataset_location;
pub mod error;
pub mod layout;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

pub use dataset_location::DatasetLocation;
pub use error::StorageError;
pub(crate) use error::UnsupportedSchemeSnafu;

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Physical storage backend for a dataset root.
///
/// Only the local filesystem is supported today.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// A root directory on the local filesystem.
    Local(PathBuf),
}

impl StorageLocation {
    /// Parse a user-facing location string.
    ///
    /// Accepts plain filesystem paths and `file://` URIs. Any other scheme
    /// (for example `s3://`) is rejected with [`StorageError::UnsupportedScheme`].
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let spec = spec.trim();
        if let Some(rest) = spec.strip_prefix("file://") {
            return Ok(StorageLocation::Local(PathBuf::from(rest)));
        }

        if let Some((scheme, _)) = spec.split_once("://") {
            return UnsupportedSchemeSnafu {
                scheme: scheme.to_string(),
            }
            .fail();
        }

        Ok(StorageLocation::Local(PathBuf::from(spec)))
    }

    /// Absolute local path of `rel` under this root.
    pub(crate) fn resolve(&self, rel: &Path) -> PathBuf {
        match self {
            StorageLocation::Local(root) => root.join(rel),
        }
    }
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| StorageError::from_io(e, path.display().to_string())
}

async fn ensure_parent(abs: &Path) -> StorageResult<()> {
    match abs.parent() {
        Some(parent) => fs::create_dir_all(parent).await.map_err(io_at(parent)),
        None => Ok(()),
    }
}

/// Removes a staged file on drop unless disarmed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique sibling of `abs` for staging its contents.
fn staging_path(abs: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    abs.with_file_name(format!(".{name}.{}-{seq}.tmp", std::process::id()))
}

/// Write and sync `contents` to a fresh staging file next to `abs`.
///
/// The returned guard deletes the staging file when dropped.
async fn stage(abs: &Path, contents: &[u8]) -> StorageResult<TempFileGuard> {
    ensure_parent(abs).await?;

    let path = staging_path(abs);
    let guard = TempFileGuard {
        path: path.clone(),
        armed: true,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(io_at(&path))?;
    file.write_all(contents).await.map_err(io_at(&path))?;
    file.sync_all().await.map_err(io_at(&path))?;
    Ok(guard)
}

/// Write `contents` to `rel_path` inside `location` using write-then-rename.
///
/// The payload goes to a staging sibling file, is synced, and is then
/// renamed over the target. On failure the staging file is removed.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    let abs = location.resolve(rel_path);
    let mut staged = stage(&abs, contents).await?;

    fs::rename(&staged.path, &abs).await.map_err(io_at(&abs))?;
    staged.armed = false;
    Ok(())
}

/// Create a *new* file at `rel_path` holding `contents`, failing with
/// [`StorageError::AlreadyExists`] if the file is already there.
///
/// Commit files and data fragments are written this way so that a version or
/// fragment is only ever created once. The payload is staged and synced
/// first, then hard-linked into place, so the target is either absent or
/// complete; a failed write never leaves a truncated file behind.
pub async fn write_new(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    let abs = location.resolve(rel_path);
    let staged = stage(&abs, contents).await?;

    fs::hard_link(&staged.path, &abs).await.map_err(io_at(&abs))
}

/// Read the file at `rel_path` within `location` as UTF-8 text.
///
/// A missing file maps to [`StorageError::NotFound`].
pub async fn read_to_string(location: &StorageLocation, rel_path: &Path) -> StorageResult<String> {
    let abs = location.resolve(rel_path);
    fs::read_to_string(&abs).await.map_err(io_at(&abs))
}

/// Read the full contents of the file at `rel_path` within `location`.
pub async fn read_all_bytes(location: &StorageLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    let abs = location.resolve(rel_path);
    fs::read(&abs).await.map_err(io_at(&abs))
}
