//! # versioned-dataset
//!
//! Time travel and multi-version metrics over a versioned columnar dataset.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust,no_run
//! use arrow::array::RecordBatch;
//! use versioned_dataset::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let location = DatasetLocation::parse("/data/readings")?;
//! let dataset = Dataset::open(location.clone()).await?;
//!
//! // Which version was live on March 1st?
//! let version = get_version_asof(&dataset, "2023-03-01").await?;
//! let view = dataset.checkout(version).await?;
//! println!("{} rows as of version {version}", view.num_rows());
//!
//! // Row counts of every version, tagged with a `version` column.
//! let report = compute_metric(
//!     location,
//!     |view: &DatasetView| {
//!         RecordBatch::try_from_iter(vec![(
//!             "rows",
//!             std::sync::Arc::new(arrow::array::UInt64Array::from(vec![view.num_rows() as u64]))
//!                 as arrow::array::ArrayRef,
//!         )])
//!     },
//!     None,
//!     VersionColumn::Default,
//! )
//! .await?;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

pub use versioned_dataset_core::dataset::{Dataset, DatasetError, DatasetView, WriteOptions};
pub use versioned_dataset_core::storage::{DatasetLocation, StorageError};
pub use versioned_dataset_core::transaction_log::{CommitError, DatasetMeta, VersionRecord};
pub use versioned_dataset_core::versioning::{
    BoxError, DEFAULT_VERSION_COLUMN, NaiveTimezone, NormalizeOptions, TimestampInput,
    VersionColumn, VersionSelector, VersionedDataset, VersioningError, compute_metric,
    compute_metric_parallel, compute_metric_with, get_version_asof, get_version_asof_with,
    normalize_timestamp, normalize_timestamp_with, resolve_version_asof,
};
