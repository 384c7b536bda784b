//! Read-only snapshot of a dataset at one version.
//!
//! A [`DatasetView`] is loaded eagerly: all live fragments of the version are
//! read from storage and decoded when the view is created, so metric code
//! can inspect it synchronously and share it across threads.
use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::error::ArrowError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::prelude::*;

use crate::{
    dataset::error::{DatasetError, ParquetReadSnafu, StorageSnafu},
    storage::{self, DatasetLocation},
    transaction_log::{DatasetMeta, DatasetState, FragmentMeta},
};

/// Version-pinned, read-only view of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetView {
    state: DatasetState,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DatasetView {
    pub(crate) async fn load(
        location: &DatasetLocation,
        state: DatasetState,
    ) -> Result<Self, DatasetError> {
        let schema = state
            .meta
            .schema_ref()
            .unwrap_or_else(|| Arc::new(Schema::empty()));

        let per_fragment: Vec<Vec<RecordBatch>> = futures::stream::iter(state.fragments.iter())
            .then(|fragment| read_fragment(location, fragment))
            .try_collect()
            .await?;

        Ok(Self {
            state,
            schema,
            batches: per_fragment.into_iter().flatten().collect(),
        })
    }

    /// Version this view is pinned to.
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Commit timestamp of the pinned version.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.state.timestamp
    }

    /// Dataset metadata in force at the pinned version.
    pub fn meta(&self) -> &DatasetMeta {
        &self.state.meta
    }

    /// Schema of the pinned version (empty if nothing was ever written).
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Live fragments, in append order.
    pub fn fragments(&self) -> &[FragmentMeta] {
        &self.state.fragments
    }

    /// Decoded record batches, in append order.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// All rows as a single batch.
    pub fn to_batch(&self) -> Result<RecordBatch, ArrowError> {
        arrow::compute::concat_batches(&self.schema, &self.batches)
    }
}

async fn read_fragment(
    location: &DatasetLocation,
    fragment: &FragmentMeta,
) -> Result<Vec<RecordBatch>, DatasetError> {
    let rel_path = Path::new(&fragment.path);

    let bytes = storage::read_all_bytes(location.as_ref(), rel_path)
        .await
        .context(StorageSnafu)?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .and_then(|builder| builder.build())
        .context(ParquetReadSnafu {
            path: fragment.path.clone(),
        })?;

    reader
        .collect::<Result<Vec<_>, ArrowError>>()
        .map_err(|source| DatasetError::Arrow { source })
}
