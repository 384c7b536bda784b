//! Dataset-scoped storage locations.

use std::path::PathBuf;

use crate::storage::{StorageLocation, StorageResult};

/// Dataset root location with dataset-scoped semantics.
///
/// This wraps [`StorageLocation`] and is what callers hand to
/// [`crate::dataset::Dataset::open`] or [`crate::versioning::compute_metric`]
/// to identify a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLocation(StorageLocation);

impl From<DatasetLocation> for StorageLocation {
    fn from(d: DatasetLocation) -> Self {
        d.0
    }
}

impl AsRef<StorageLocation> for DatasetLocation {
    fn as_ref(&self) -> &StorageLocation {
        &self.0
    }
}

impl DatasetLocation {
    /// Creates a new `DatasetLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        DatasetLocation(StorageLocation::Local(root.into()))
    }

    /// Parse a user-facing dataset locator (a path or a `file://` URI).
    pub fn parse(spec: &str) -> StorageResult<Self> {
        StorageLocation::parse(spec).map(DatasetLocation)
    }
}

impl std::fmt::Display for DatasetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            StorageLocation::Local(root) => write!(f, "{}", root.display()),
        }
    }
}
