//! Wrapper prelude.
//!
//! The `versioned-dataset` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::{
    Dataset, DatasetError, DatasetLocation, DatasetView, TimestampInput, VersionColumn,
    VersionRecord, VersionSelector, VersionedDataset, VersioningError, WriteOptions,
    compute_metric, compute_metric_with, get_version_asof, normalize_timestamp,
    resolve_version_asof,
};
