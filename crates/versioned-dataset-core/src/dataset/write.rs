//! Write path for [`Dataset`].
//!
//! Every write follows the same flow:
//! - validate the batch against the schema rules (adopt on the first write,
//!   exact field match afterwards, fresh schema on overwrite),
//! - encode the batch as one Parquet fragment and store it under a
//!   content-addressed id with a create-only write,
//! - commit the log actions against the cached version (optimistic
//!   concurrency) and fold the new commit into the cached state.
use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use chrono::{DateTime, Utc};
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    dataset::{
        Dataset,
        error::{
            DatasetError, EmptyBatchSnafu, FragmentNotFoundSnafu, ParquetWriteSnafu,
            SchemaMismatchSnafu, StorageSnafu, TransactionLogSnafu,
        },
    },
    storage::{self, StorageError, layout},
    transaction_log::{FileFormat, FragmentId, FragmentMeta, LogAction, fragment_id_v1},
};

/// Options controlling a single write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Commit timestamp to record instead of the wall clock. Must not be
    /// earlier than the previous commit.
    pub commit_timestamp: Option<DateTime<Utc>>,
    /// Maximum rows per Parquet row group; the Parquet default when `None`.
    pub max_row_group_size: Option<usize>,
}

impl WriteOptions {
    /// Record `timestamp` as the commit timestamp.
    pub fn with_commit_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.commit_timestamp = Some(timestamp);
        self
    }

    /// Cap Parquet row groups at `rows` rows.
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = Some(rows);
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        let mut builder = WriterProperties::builder();
        if let Some(rows) = self.max_row_group_size {
            builder = builder.set_max_row_group_size(rows.max(1));
        }
        builder.build()
    }
}

fn encode_fragment(batch: &RecordBatch, options: &WriteOptions) -> Result<Vec<u8>, DatasetError> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buf,
        batch.schema(),
        Some(options.writer_properties()),
    )
    .context(ParquetWriteSnafu)?;
    writer.write(batch).context(ParquetWriteSnafu)?;
    writer.close().context(ParquetWriteSnafu)?;
    Ok(buf)
}

impl Dataset {
    /// Append `batch` as a new version, stamped with the wall clock.
    pub async fn append(&mut self, batch: &RecordBatch) -> Result<u64, DatasetError> {
        self.append_with(batch, WriteOptions::default()).await
    }

    /// Append `batch` as a new version.
    ///
    /// The first write adopts the batch's schema (unless one was supplied at
    /// creation); later writes must match it field for field.
    pub async fn append_with(
        &mut self,
        batch: &RecordBatch,
        options: WriteOptions,
    ) -> Result<u64, DatasetError> {
        ensure!(batch.num_rows() > 0, EmptyBatchSnafu);

        let mut actions = Vec::with_capacity(2);
        match self.state.meta.schema.as_ref() {
            Some(schema) => {
                ensure_same_fields(schema, batch.schema().as_ref(), self.state.version)?;
                if self.state.version == 0 {
                    actions.push(LogAction::UpdateDatasetMeta(self.state.meta.clone()));
                }
            }
            None => {
                let mut meta = self.state.meta.clone();
                meta.schema = Some(batch.schema().as_ref().clone());
                actions.push(LogAction::UpdateDatasetMeta(meta));
            }
        }

        let fragment = self.write_fragment(batch, &options).await?;
        actions.push(LogAction::AddFragment(fragment));

        self.commit(actions, options.commit_timestamp).await
    }

    /// Replace all live fragments with `batch` as a new version, stamped with
    /// the wall clock.
    pub async fn overwrite(&mut self, batch: &RecordBatch) -> Result<u64, DatasetError> {
        self.overwrite_with(batch, WriteOptions::default()).await
    }

    /// Replace all live fragments with `batch` as a new version.
    ///
    /// The batch's schema becomes the dataset schema; earlier versions keep
    /// theirs.
    pub async fn overwrite_with(
        &mut self,
        batch: &RecordBatch,
        options: WriteOptions,
    ) -> Result<u64, DatasetError> {
        ensure!(batch.num_rows() > 0, EmptyBatchSnafu);

        let mut actions: Vec<LogAction> = self
            .state
            .fragments
            .iter()
            .map(|f| LogAction::RemoveFragment {
                fragment_id: f.fragment_id.clone(),
            })
            .collect();

        let mut meta = self.state.meta.clone();
        meta.schema = Some(batch.schema().as_ref().clone());
        actions.push(LogAction::UpdateDatasetMeta(meta));

        let fragment = self.write_fragment(batch, &options).await?;
        actions.push(LogAction::AddFragment(fragment));

        self.commit(actions, options.commit_timestamp).await
    }

    /// Remove one live fragment as a new version.
    ///
    /// The fragment file stays on disk; older versions still read it.
    pub async fn delete_fragment(
        &mut self,
        fragment_id: &FragmentId,
        options: WriteOptions,
    ) -> Result<u64, DatasetError> {
        ensure!(
            self.state.fragment(fragment_id).is_some(),
            FragmentNotFoundSnafu {
                fragment_id: fragment_id.clone(),
                version: self.state.version,
            }
        );

        let actions = vec![LogAction::RemoveFragment {
            fragment_id: fragment_id.clone(),
        }];
        self.commit(actions, options.commit_timestamp).await
    }

    async fn write_fragment(
        &self,
        batch: &RecordBatch,
        options: &WriteOptions,
    ) -> Result<FragmentMeta, DatasetError> {
        let data = encode_fragment(batch, options)?;
        let fragment_id = fragment_id_v1(self.state.version, &data);
        let rel_path = layout::fragment_rel_path(&fragment_id.0);

        match storage::write_new(self.location.as_ref(), &rel_path, &data).await {
            Ok(()) => {}
            // Same id means same bytes: a retried write already stored it.
            Err(e @ StorageError::AlreadyExists { .. }) => {
                debug!(
                    "fragment {fragment_id} already present at {}, reusing it",
                    e.path().unwrap_or_default()
                );
            }
            Err(source) => return Err(source).context(StorageSnafu),
        }

        Ok(FragmentMeta {
            path: layout::fragment_rel_key(&fragment_id.0),
            fragment_id,
            row_count: batch.num_rows() as u64,
            format: FileFormat::Parquet,
        })
    }

    async fn commit(
        &mut self,
        actions: Vec<LogAction>,
        commit_timestamp: Option<DateTime<Utc>>,
    ) -> Result<u64, DatasetError> {
        let expected = self.state.version;
        let version = match commit_timestamp {
            Some(ts) => {
                self.log
                    .commit_with_expected_version_at(expected, ts, actions)
                    .await
            }
            None => self.log.commit_with_expected_version(expected, actions).await,
        }
        .context(TransactionLogSnafu)?;

        let commit = self
            .log
            .load_commit(version)
            .await
            .context(TransactionLogSnafu)?;
        self.state.apply_commit(commit).context(TransactionLogSnafu)?;

        Ok(version)
    }
}

fn ensure_same_fields(
    expected: &Schema,
    found: &Schema,
    version: u64,
) -> Result<(), DatasetError> {
    ensure!(
        expected.fields() == found.fields(),
        SchemaMismatchSnafu {
            version,
            expected: format_fields(expected),
            found: format_fields(found),
        }
    );
    Ok(())
}

fn format_fields(schema: &Schema) -> String {
    let fields: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let null = if f.is_nullable() { "" } else { " not null" };
            format!("{}: {}{null}", f.name(), f.data_type())
        })
        .collect();
    format!("[{}]", fields.join(", "))
}
