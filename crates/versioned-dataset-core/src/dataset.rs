//! Local versioned dataset.
//!
//! A [`Dataset`] is a directory holding Parquet fragments under `data/` and
//! a version log under `_versions/`. Every write produces a new version;
//! every committed version stays readable through [`Dataset::checkout`],
//! which materializes a [`DatasetView`] pinned to that version.
//!
//! `Dataset` implements [`VersionedDataset`], so it can be handed to the
//! resolver and aggregator in [`crate::versioning`].
//!
//! ```no_run
//! use arrow::array::Int64Array;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use std::sync::Arc;
//! use versioned_dataset_core::dataset::Dataset;
//! use versioned_dataset_core::storage::DatasetLocation;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
//! let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
//!
//! let mut ds = Dataset::create(DatasetLocation::local("/tmp/my_dataset")).await?;
//! let v1 = ds.append(&batch).await?;
//! let view = ds.checkout(v1).await?;
//! assert_eq!(view.num_rows(), 3);
//! # Ok(())
//! # }
//! ```
pub mod error;
pub mod view;
pub mod write;

pub use error::DatasetError;
pub use view::DatasetView;
pub use write::WriteOptions;

use async_trait::async_trait;
use log::debug;
use snafu::prelude::*;

use crate::{
    dataset::error::{
        AlreadyExistsSnafu, AsOfSnafu, EmptyDatasetSnafu, TransactionLogSnafu,
        VersionNotFoundSnafu,
    },
    storage::DatasetLocation,
    transaction_log::{
        CommitError, DatasetMeta, DatasetState, TransactionLogStore, VersionRecord,
    },
    versioning::{TimestampInput, VersionedDataset, get_version_asof},
};

/// Handle to a versioned dataset on the local filesystem.
///
/// The handle caches the state of one version (the latest one after
/// [`Dataset::open`], or a pinned one after [`Dataset::open_at`]). Writes
/// are prepared against that cached version and fail with a commit conflict
/// if another writer has moved CURRENT in the meantime.
#[derive(Debug, Clone)]
pub struct Dataset {
    location: DatasetLocation,
    log: TransactionLogStore,
    state: DatasetState,
}

impl Dataset {
    /// Create a new, empty dataset at `location`.
    ///
    /// No version is committed until the first write; that write adopts its
    /// batch's schema. Fails with `AlreadyExists` if the location already
    /// holds commits.
    pub async fn create(location: DatasetLocation) -> Result<Self, DatasetError> {
        Self::create_with_meta(location, DatasetMeta::new()).await
    }

    /// Create a new, empty dataset with caller-supplied metadata.
    ///
    /// If `meta.schema` is set, the first write must match it.
    pub async fn create_with_meta(
        location: DatasetLocation,
        meta: DatasetMeta,
    ) -> Result<Self, DatasetError> {
        let log = TransactionLogStore::new(location.clone());
        let current_version = log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(current_version == 0, AlreadyExistsSnafu { current_version });

        let mut state = DatasetState::empty();
        state.meta = meta;

        Ok(Self {
            location,
            log,
            state,
        })
    }

    /// Open an existing dataset at its latest version.
    pub async fn open(location: DatasetLocation) -> Result<Self, DatasetError> {
        let log = TransactionLogStore::new(location.clone());
        let current = log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(current != 0, EmptyDatasetSnafu);

        let state = rebuild_state(&log, current).await?;
        Ok(Self {
            location,
            log,
            state,
        })
    }

    /// Open an existing dataset pinned to `version`.
    ///
    /// Reads see that version. Writes from a handle pinned to an older
    /// version fail with a commit conflict.
    pub async fn open_at(location: DatasetLocation, version: u64) -> Result<Self, DatasetError> {
        let log = TransactionLogStore::new(location.clone());
        let latest = log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(latest != 0, EmptyDatasetSnafu);
        ensure!(
            version != 0 && version <= latest,
            VersionNotFoundSnafu { version, latest }
        );

        let state = rebuild_state(&log, version).await?;
        Ok(Self {
            location,
            log,
            state,
        })
    }

    /// Root location of this dataset.
    pub fn location(&self) -> &DatasetLocation {
        &self.location
    }

    /// Cached state of the version this handle is positioned at.
    pub fn state(&self) -> &DatasetState {
        &self.state
    }

    /// Version this handle is positioned at (0 before the first write).
    pub fn current_version(&self) -> u64 {
        self.state.version
    }

    /// Refresh the cached state from the latest committed version.
    ///
    /// Returns the version the handle now points at.
    pub async fn load_latest_state(&mut self) -> Result<u64, DatasetError> {
        let current = self
            .log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;

        if current != self.state.version {
            self.state = if current == 0 {
                DatasetState::empty()
            } else {
                rebuild_state(&self.log, current).await?
            };
        }
        Ok(current)
    }

    /// Full committed history, oldest first.
    pub async fn versions(&self) -> Result<Vec<VersionRecord>, DatasetError> {
        self.log.list_versions().await.context(TransactionLogSnafu)
    }

    /// Materialize a read-only view pinned to `version`.
    ///
    /// Fails with `VersionNotFound` if `version` is 0 or newer than the latest
    /// committed version.
    pub async fn checkout(&self, version: u64) -> Result<DatasetView, DatasetError> {
        let latest = self
            .log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(
            version != 0 && version <= latest,
            VersionNotFoundSnafu { version, latest }
        );

        let state = if version == self.state.version {
            self.state.clone()
        } else {
            rebuild_state(&self.log, version).await?
        };

        debug!("checking out version {version} of {}", self.location);
        DatasetView::load(&self.location, state).await
    }

    /// Materialize the view that was current at `timestamp`.
    ///
    /// Naive timestamps are read as system local time; use
    /// [`crate::versioning::get_version_asof_with`] and [`Dataset::checkout`]
    /// to pick another zone.
    pub async fn checkout_asof(
        &self,
        timestamp: impl Into<TimestampInput> + Send,
    ) -> Result<DatasetView, DatasetError> {
        let version = get_version_asof(self, timestamp).await.context(AsOfSnafu)?;
        self.checkout(version).await
    }
}

async fn rebuild_state(
    log: &TransactionLogStore,
    version: u64,
) -> Result<DatasetState, DatasetError> {
    match log.rebuild_dataset_state_at(version).await {
        Ok(state) => Ok(state),
        Err(CommitError::VersionNotFound { version, current }) => VersionNotFoundSnafu {
            version,
            latest: current,
        }
        .fail(),
        Err(source) => Err(DatasetError::TransactionLog { source }),
    }
}

#[async_trait]
impl VersionedDataset for Dataset {
    type View = DatasetView;
    type Error = DatasetError;

    async fn versions(&self) -> Result<Vec<VersionRecord>, DatasetError> {
        Dataset::versions(self).await
    }

    async fn checkout(&self, version: u64) -> Result<DatasetView, DatasetError> {
        Dataset::checkout(self, version).await
    }
}
