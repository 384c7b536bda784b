//! Time-travel version resolution.
use chrono::{DateTime, Utc};
use snafu::prelude::*;

use crate::{
    transaction_log::VersionRecord,
    versioning::{
        VersionedDataset,
        error::{OutOfRangeSnafu, VersioningError},
        timestamp::{NormalizeOptions, TimestampInput, normalize_timestamp_with},
    },
};

/// Pick the most recent version committed at or before `timestamp`.
///
/// `versions` must be ordered by increasing version (and therefore
/// non-decreasing timestamp). When several versions share a timestamp the
/// largest version wins.
pub fn resolve_version_asof(
    versions: &[VersionRecord],
    timestamp: DateTime<Utc>,
) -> Result<u64, VersioningError> {
    versions
        .iter()
        .rev()
        .find(|v| v.timestamp <= timestamp)
        .map(|v| v.version)
        .context(OutOfRangeSnafu {
            timestamp,
            earliest: versions.first().map(|v| v.timestamp),
        })
}

/// Return the version of `dataset` that was current as of `timestamp`.
///
/// Naive timestamps are read as system local time. The timestamp is normalized
/// before the store is queried, so malformed input never touches storage.
pub async fn get_version_asof<D>(
    dataset: &D,
    timestamp: impl Into<TimestampInput>,
) -> Result<u64, VersioningError>
where
    D: VersionedDataset + ?Sized,
{
    get_version_asof_with(dataset, timestamp, &NormalizeOptions::default()).await
}

/// [`get_version_asof`] with explicit normalization options.
pub async fn get_version_asof_with<D>(
    dataset: &D,
    timestamp: impl Into<TimestampInput>,
    options: &NormalizeOptions,
) -> Result<u64, VersioningError>
where
    D: VersionedDataset + ?Sized,
{
    let timestamp = normalize_timestamp_with(timestamp, options)?;
    let versions = dataset
        .versions()
        .await
        .map_err(|e| VersioningError::Store { source: e.into() })?;
    resolve_version_asof(&versions, timestamp)
}
