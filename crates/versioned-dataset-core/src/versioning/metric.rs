//! Multi-version metric aggregation.
//!
//! A metric is any function from a version-pinned view to an Arrow
//! [`RecordBatch`]. The aggregator evaluates it once per requested version,
//! tags each result with its version and merges everything into one report.
use std::num::NonZeroUsize;

use arrow::array::RecordBatch;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    dataset::{Dataset, DatasetView},
    storage::DatasetLocation,
    transaction_log::VersionRecord,
    versioning::{
        BoxError, VersionedDataset,
        error::{ThreadPoolSnafu, VersioningError},
        merge::{merge_tagged, tag_with_version},
    },
};

/// Name of the version column when none is configured.
pub const DEFAULT_VERSION_COLUMN: &str = "version";

/// A version to evaluate, given by identifier or by its full record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// Bare version identifier.
    Id(u64),
    /// Record as reported by the store; only the identifier is used.
    Record(VersionRecord),
}

impl VersionSelector {
    /// Version identifier this selector designates.
    pub fn version(&self) -> u64 {
        match self {
            VersionSelector::Id(v) => *v,
            VersionSelector::Record(r) => r.version,
        }
    }
}

impl From<u64> for VersionSelector {
    fn from(v: u64) -> Self {
        VersionSelector::Id(v)
    }
}

impl From<VersionRecord> for VersionSelector {
    fn from(r: VersionRecord) -> Self {
        VersionSelector::Record(r)
    }
}

impl From<&VersionRecord> for VersionSelector {
    fn from(r: &VersionRecord) -> Self {
        VersionSelector::Record(*r)
    }
}

/// Name of the column that tags each result row with its version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionColumn {
    /// Use [`DEFAULT_VERSION_COLUMN`].
    #[default]
    Default,
    /// Use a caller-chosen name.
    Named(String),
}

impl VersionColumn {
    /// Column name to write.
    pub fn name(&self) -> &str {
        match self {
            VersionColumn::Default => DEFAULT_VERSION_COLUMN,
            VersionColumn::Named(name) => name,
        }
    }
}

impl From<&str> for VersionColumn {
    fn from(name: &str) -> Self {
        VersionColumn::Named(name.to_string())
    }
}

impl From<String> for VersionColumn {
    fn from(name: String) -> Self {
        VersionColumn::Named(name)
    }
}

async fn select_versions<D>(
    dataset: &D,
    versions: Option<Vec<VersionSelector>>,
) -> Result<Vec<u64>, VersioningError>
where
    D: VersionedDataset + ?Sized,
{
    match versions {
        Some(selected) => Ok(selected.iter().map(VersionSelector::version).collect()),
        None => {
            let listed = dataset
                .versions()
                .await
                .map_err(|e| VersioningError::Store { source: e.into() })?;
            Ok(listed.iter().map(|r| r.version).collect())
        }
    }
}

async fn checkout<D>(dataset: &D, version: u64) -> Result<D::View, VersioningError>
where
    D: VersionedDataset + ?Sized,
{
    dataset
        .checkout(version)
        .await
        .map_err(|e| VersioningError::Store { source: e.into() })
}

/// Evaluate `metric` against each requested version of `dataset` and merge
/// the version-tagged results.
///
/// With `versions == None` every version the store lists (at call time) is
/// evaluated. Versions are checked out and evaluated one at a time, in the
/// requested order. The first store or metric failure aborts the call.
pub async fn compute_metric_with<D, F, E>(
    dataset: &D,
    mut metric: F,
    versions: Option<Vec<VersionSelector>>,
    version_column: VersionColumn,
) -> Result<RecordBatch, VersioningError>
where
    D: VersionedDataset + ?Sized,
    F: FnMut(&D::View) -> Result<RecordBatch, E>,
    E: Into<BoxError>,
{
    let selected = select_versions(dataset, versions).await?;
    let column = version_column.name();

    let mut tagged = Vec::with_capacity(selected.len());
    for version in selected {
        let view = checkout(dataset, version).await?;
        debug!("evaluating metric on version {version}");

        let result = metric(&view).map_err(|e| VersioningError::Metric {
            version,
            source: e.into(),
        })?;
        tagged.push(tag_with_version(result, column, version)?);
    }

    merge_tagged(&tagged, column)
}

/// Like [`compute_metric_with`], but evaluates the metric on a rayon pool.
///
/// Views are still checked out one at a time; only metric evaluation runs
/// in parallel. Results are merged in request order, so a pure metric gives
/// the same report as the sequential path.
pub async fn compute_metric_parallel<D, F, E>(
    dataset: &D,
    metric: F,
    versions: Option<Vec<VersionSelector>>,
    version_column: VersionColumn,
) -> Result<RecordBatch, VersioningError>
where
    D: VersionedDataset + ?Sized,
    D::View: Sync,
    F: Fn(&D::View) -> Result<RecordBatch, E> + Sync,
    E: Into<BoxError>,
{
    let selected = select_versions(dataset, versions).await?;
    let column = version_column.name();

    let mut views = Vec::with_capacity(selected.len());
    for version in selected {
        views.push((version, checkout(dataset, version).await?));
    }

    if views.is_empty() {
        return merge_tagged(&[], column);
    }

    let threads = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(views.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context(ThreadPoolSnafu)?;

    let tagged: Result<Vec<RecordBatch>, VersioningError> = pool.install(|| {
        views
            .par_iter()
            .map(|(version, view)| {
                debug!("evaluating metric on version {version}");
                let result = metric(view).map_err(|e| VersioningError::Metric {
                    version: *version,
                    source: e.into(),
                })?;
                tag_with_version(result, column, *version)
            })
            .collect()
    });

    merge_tagged(&tagged?, column)
}

/// Open the local dataset at `location` and run [`compute_metric_with`]
/// against it.
pub async fn compute_metric<F, E>(
    location: DatasetLocation,
    metric: F,
    versions: Option<Vec<VersionSelector>>,
    version_column: VersionColumn,
) -> Result<RecordBatch, VersioningError>
where
    F: FnMut(&DatasetView) -> Result<RecordBatch, E>,
    E: Into<BoxError>,
{
    let dataset = Dataset::open(location)
        .await
        .map_err(|e| VersioningError::Store { source: e.into() })?;
    compute_metric_with(&dataset, metric, versions, version_column).await
}
