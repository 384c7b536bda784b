#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::compute::kernels::aggregate;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use versioned_dataset_core::{
    dataset::{Dataset, DatasetError, DatasetView, WriteOptions},
    storage::DatasetLocation,
    versioning::{
        VersionColumn, VersionSelector, VersioningError, compute_metric, compute_metric_parallel,
        compute_metric_with,
    },
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid UTC timestamp")
}

fn scores(labels: &[&str], values: &[f64]) -> RecordBatch {
    RecordBatch::try_from_iter(vec![
        ("label", Arc::new(StringArray::from(labels.to_vec())) as ArrayRef),
        ("score", Arc::new(Float64Array::from(values.to_vec())) as ArrayRef),
    ])
    .expect("valid batch")
}

/// Three appends: 2, 1 and 3 rows.
async fn growing_dataset(tmp: &TempDir) -> Result<Dataset, DatasetError> {
    let mut ds = Dataset::create(DatasetLocation::local(tmp.path())).await?;
    let batches = [
        (scores(&["a", "b"], &[0.5, 0.7]), utc(2023, 1, 1)),
        (scores(&["c"], &[0.9]), utc(2023, 2, 1)),
        (scores(&["d", "e", "f"], &[0.1, 0.2, 0.3]), utc(2023, 3, 1)),
    ];
    for (batch, ts) in &batches {
        ds.append_with(batch, WriteOptions::default().with_commit_timestamp(*ts))
            .await?;
    }
    Ok(ds)
}

/// One row per version: row count and mean score.
fn summary(view: &DatasetView) -> Result<RecordBatch, ArrowError> {
    let batch = view.to_batch()?;
    let score = batch
        .column_by_name("score")
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| ArrowError::SchemaError("missing score column".to_string()))?;
    let mean = aggregate::sum(score).map(|s| s / score.len() as f64);

    RecordBatch::try_from_iter(vec![
        (
            "rows",
            Arc::new(Int64Array::from(vec![batch.num_rows() as i64])) as ArrayRef,
        ),
        ("mean_score", Arc::new(Float64Array::from(vec![mean])) as ArrayRef),
    ])
}

/// Every row of the version, unchanged.
fn all_rows(view: &DatasetView) -> Result<RecordBatch, ArrowError> {
    view.to_batch()
}

fn u64_column(batch: &RecordBatch, name: &str) -> Vec<u64> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .expect("u64 column")
        .values()
        .to_vec()
}

fn i64_column(batch: &RecordBatch, name: &str) -> Vec<i64> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .expect("i64 column")
        .values()
        .to_vec()
}

#[tokio::test]
async fn summary_metric_over_all_versions() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;

    let report = compute_metric_with(&ds, summary, None, VersionColumn::Default).await?;

    let names: Vec<_> = report
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec!["rows", "mean_score", "version"]);
    assert_eq!(i64_column(&report, "rows"), vec![2, 3, 6]);
    assert_eq!(u64_column(&report, "version"), vec![1, 2, 3]);
    assert_eq!(
        report.schema().field_with_name("version")?.data_type(),
        &DataType::UInt64
    );
    Ok(())
}

#[tokio::test]
async fn row_level_metric_keeps_version_major_order() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;

    let report = compute_metric_with(&ds, all_rows, None, VersionColumn::Default).await?;

    // Version i contributes every row visible at version i.
    assert_eq!(report.num_rows(), 2 + 3 + 6);
    assert_eq!(
        u64_column(&report, "version"),
        vec![1, 1, 2, 2, 2, 3, 3, 3, 3, 3, 3]
    );
    let labels = report
        .column_by_name("label")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .expect("label column");
    let labels: Vec<_> = labels.iter().flatten().collect();
    assert_eq!(
        labels,
        vec!["a", "b", "a", "b", "c", "a", "b", "c", "d", "e", "f"]
    );
    Ok(())
}

#[tokio::test]
async fn locator_entry_point_with_selection_and_custom_column() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;
    let history = ds.versions().await?;

    let report = compute_metric(
        DatasetLocation::local(tmp.path()),
        summary,
        Some(vec![
            VersionSelector::from(&history[2]),
            VersionSelector::from(1),
        ]),
        VersionColumn::from("snapshot"),
    )
    .await?;

    assert_eq!(u64_column(&report, "snapshot"), vec![3, 1]);
    assert_eq!(i64_column(&report, "rows"), vec![6, 2]);
    assert!(report.column_by_name("version").is_none());
    Ok(())
}

#[tokio::test]
async fn metric_that_emits_version_column_conflicts() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;

    let err = compute_metric_with(
        &ds,
        |view: &DatasetView| {
            RecordBatch::try_from_iter(vec![(
                "version",
                Arc::new(UInt64Array::from(vec![view.version()])) as ArrayRef,
            )])
        },
        None,
        VersionColumn::Default,
    )
    .await
    .expect_err("version column already present");

    match err {
        VersioningError::SchemaConflict { column, version } => {
            assert_eq!(column, "version");
            assert_eq!(version, 1);
        }
        other => panic!("expected SchemaConflict, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unknown_version_is_a_store_error() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;

    let err = compute_metric_with(
        &ds,
        summary,
        Some(vec![VersionSelector::Id(1), VersionSelector::Id(9)]),
        VersionColumn::Default,
    )
    .await
    .expect_err("version 9 does not exist");

    match err {
        VersioningError::Store { source } => {
            let inner = source
                .downcast_ref::<DatasetError>()
                .expect("dataset error is passed through");
            assert!(matches!(
                inner,
                DatasetError::VersionNotFound {
                    version: 9,
                    latest: 3
                }
            ));
        }
        other => panic!("expected Store, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_columns_are_null_filled_across_schema_changes() -> TestResult {
    let tmp = TempDir::new()?;
    let mut ds = growing_dataset(&tmp).await?;
    let ids = RecordBatch::try_from_iter(vec![(
        "id",
        Arc::new(Int64Array::from(vec![10, 11])) as ArrayRef,
    )])?;
    ds.overwrite_with(
        &ids,
        WriteOptions::default().with_commit_timestamp(utc(2023, 4, 1)),
    )
    .await?;

    let report = compute_metric_with(
        &ds,
        all_rows,
        Some(vec![VersionSelector::Id(1), VersionSelector::Id(4)]),
        VersionColumn::Default,
    )
    .await?;

    let schema = report.schema();
    let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["label", "score", "version", "id"]);
    assert_eq!(report.num_rows(), 4);
    assert_eq!(
        report.column_by_name("label").expect("label").null_count(),
        2
    );
    assert_eq!(report.column_by_name("id").expect("id").null_count(), 2);
    assert!(schema.field_with_name("id")?.is_nullable());
    assert!(!schema.field_with_name("version")?.is_nullable());
    Ok(())
}

#[tokio::test]
async fn parallel_evaluation_matches_sequential() -> TestResult {
    let tmp = TempDir::new()?;
    let ds = growing_dataset(&tmp).await?;

    let sequential = compute_metric_with(&ds, summary, None, VersionColumn::Default).await?;
    let parallel = compute_metric_parallel(&ds, summary, None, VersionColumn::Default).await?;

    assert_eq!(sequential, parallel);
    Ok(())
}

#[tokio::test]
async fn opening_a_missing_dataset_is_a_store_error() -> TestResult {
    let tmp = TempDir::new()?;

    let err = compute_metric(
        DatasetLocation::local(tmp.path().join("nope")),
        summary,
        None,
        VersionColumn::Default,
    )
    .await
    .expect_err("no dataset there");

    assert!(matches!(err, VersioningError::Store { .. }));
    Ok(())
}
