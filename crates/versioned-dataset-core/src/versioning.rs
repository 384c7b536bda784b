//! Time travel and cross-version metrics over a versioned dataset.
//!
//! Two helpers sit on top of any store that can list its versions and check
//! one out:
//!
//! - [`get_version_asof`]: which version was current at a given instant?
//!   The instant may be ISO-8601 text, a naive or aware `chrono` value, or
//!   an Arrow-style epoch scalar; it is normalized to UTC first
//!   ([`normalize_timestamp`]) and then resolved against the version list
//!   ([`resolve_version_asof`]).
//! - [`compute_metric_with`]: evaluate a metric function once per version,
//!   tag each result with its version and merge the results into one Arrow
//!   [`RecordBatch`](arrow::array::RecordBatch).
//!   [`compute_metric`] does the same for a local dataset given by location.
//!
//! The store is abstracted by [`VersionedDataset`];
//! [`crate::dataset::Dataset`] is the local implementation.
pub mod error;
pub mod merge;
pub mod metric;
pub mod resolve;
pub mod timestamp;

pub use error::VersioningError;
pub use metric::{
    DEFAULT_VERSION_COLUMN, VersionColumn, VersionSelector, compute_metric,
    compute_metric_parallel, compute_metric_with,
};
pub use resolve::{get_version_asof, get_version_asof_with, resolve_version_asof};
pub use timestamp::{
    NaiveTimezone, NormalizeOptions, TimestampInput, normalize_timestamp,
    normalize_timestamp_with,
};

use async_trait::async_trait;

use crate::transaction_log::VersionRecord;

/// Type-erased error carried through from stores and metric functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A dataset that keeps every committed version readable.
#[async_trait]
pub trait VersionedDataset: Send + Sync {
    /// Read-only view of one version.
    type View: Send;
    /// Store error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// All versions, ordered by increasing version.
    async fn versions(&self) -> Result<Vec<VersionRecord>, Self::Error>;

    /// View pinned to `version`.
    async fn checkout(&self, version: u64) -> Result<Self::View, Self::Error>;
}
