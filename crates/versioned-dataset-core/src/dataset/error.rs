//! Error types and SNAFU context selectors for the local dataset store.
//!
//! Sibling modules attach context through the `pub(crate)` selectors so the
//! user-facing messages for every dataset operation live in one place.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::{
    storage::StorageError,
    transaction_log::{CommitError, FragmentId},
    versioning::VersioningError,
};

/// Errors from local dataset operations (create/open/append/checkout).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DatasetError {
    /// Any error coming from the version log (conflicts, storage failures,
    /// corrupt commits).
    #[snafu(display("Transaction log error: {source}"))]
    TransactionLog {
        /// Underlying commit error.
        #[snafu(source, backtrace)]
        source: CommitError,
    },

    /// Attempting to open a dataset that has no commits (CURRENT == 0).
    #[snafu(display("Cannot open dataset with no commits (CURRENT version is 0)"))]
    EmptyDataset,

    /// Attempt to create a dataset where commits already exist.
    #[snafu(display("Dataset already exists; current version is {current_version}"))]
    AlreadyExists {
        /// Latest committed version found at the location.
        current_version: u64,
    },

    /// Requested version is not part of the committed history.
    #[snafu(display("Version {version} not found (latest is {latest})"))]
    VersionNotFound {
        /// Requested version.
        version: u64,
        /// Latest committed version.
        latest: u64,
    },

    /// Appended batch does not match the dataset schema.
    #[snafu(display("Schema mismatch at version {version}: expected {expected}, found {found}"))]
    SchemaMismatch {
        /// Version the append was prepared against.
        version: u64,
        /// Dataset schema, rendered for display.
        expected: String,
        /// Incoming batch schema, rendered for display.
        found: String,
    },

    /// Appending a batch with no rows.
    #[snafu(display("Cannot write an empty batch"))]
    EmptyBatch,

    /// Storage error while reading or writing fragment files.
    #[snafu(display("Storage error while accessing dataset data: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// Parquet decode error while reading a fragment.
    #[snafu(display("Parquet read error in {path}: {source}"))]
    ParquetRead {
        /// Fragment path relative to the dataset root.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Parquet encode error while writing a fragment.
    #[snafu(display("Parquet write error: {source}"))]
    ParquetWrite {
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Arrow error while decoding or combining batches.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// Removing a fragment that is not live at the current version.
    #[snafu(display("Fragment {fragment_id} is not live at version {version}"))]
    FragmentNotFound {
        /// Requested fragment.
        fragment_id: FragmentId,
        /// Version the removal was prepared against.
        version: u64,
    },

    /// Resolving a timestamp to a version failed during an as-of checkout.
    #[snafu(display("As-of checkout failed: {source}"))]
    AsOf {
        /// Underlying resolution error (boxed to keep the variant small).
        #[snafu(source(from(VersioningError, Box::new)))]
        source: Box<VersioningError>,
    },
}
