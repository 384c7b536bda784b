//! Version tagging and merging of per-version metric results.
//!
//! Each result is tagged with a non-null `UInt64` version column appended as
//! its last column. Tagged results are then merged into one batch:
//!
//! - columns are the union of all result columns, in first-seen order;
//! - a column missing from some result is null-filled there and becomes
//!   nullable in the merged schema;
//! - the same column name with two different types is an error, and so is
//!   a result that repeats a column name;
//! - rows keep version-major order, then each result's own row order.
use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions, UInt64Array, new_null_array};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::versioning::error::{MergeSnafu, SchemaConflictSnafu, VersioningError};

/// Append `column` holding `version` to every row of `batch`.
///
/// Fails with `SchemaConflict` if `batch` already has a column named
/// `column`.
pub fn tag_with_version(
    batch: RecordBatch,
    column: &str,
    version: u64,
) -> Result<RecordBatch, VersioningError> {
    let schema = batch.schema();
    ensure!(
        schema.column_with_name(column).is_none(),
        SchemaConflictSnafu { column, version }
    );

    let num_rows = batch.num_rows();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(column, DataType::UInt64, false));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(UInt64Array::from_value(version, num_rows)));

    let tagged_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    with_row_count(tagged_schema, columns, num_rows).context(MergeSnafu)
}

/// Merge version-tagged results into one batch.
///
/// With no results, returns an empty batch holding only `version_column`.
pub fn merge_tagged(
    batches: &[RecordBatch],
    version_column: &str,
) -> Result<RecordBatch, VersioningError> {
    if batches.is_empty() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            version_column,
            DataType::UInt64,
            false,
        )]));
        return Ok(RecordBatch::new_empty(schema));
    }

    let schema = unified_schema(batches).context(MergeSnafu)?;
    let aligned = batches
        .iter()
        .map(|batch| align_to(batch, &schema))
        .collect::<Result<Vec<_>, _>>()
        .context(MergeSnafu)?;

    concat_batches(&schema, &aligned).context(MergeSnafu)
}

fn unified_schema(batches: &[RecordBatch]) -> Result<SchemaRef, ArrowError> {
    let mut fields: Vec<Field> = Vec::new();

    for batch in batches {
        let schema = batch.schema();
        let mut seen = HashSet::with_capacity(schema.fields().len());
        for field in schema.fields() {
            if !seen.insert(field.name()) {
                return Err(ArrowError::SchemaError(format!(
                    "column {} appears more than once in one result",
                    field.name()
                )));
            }
        }

        for field in schema.fields() {
            match fields.iter_mut().find(|f| f.name() == field.name()) {
                Some(existing) => {
                    if existing.data_type() != field.data_type() {
                        return Err(ArrowError::SchemaError(format!(
                            "column {} is {} in one result and {} in another",
                            field.name(),
                            existing.data_type(),
                            field.data_type()
                        )));
                    }
                    if field.is_nullable() && !existing.is_nullable() {
                        *existing = existing.clone().with_nullable(true);
                    }
                }
                None => fields.push(field.as_ref().clone()),
            }
        }
    }

    for field in fields.iter_mut() {
        let missing_somewhere = batches
            .iter()
            .any(|b| b.schema().column_with_name(field.name()).is_none());
        if missing_somewhere {
            *field = field.clone().with_nullable(true);
        }
    }

    Ok(Arc::new(Schema::new(fields)))
}

fn align_to(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let num_rows = batch.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(col) => col.clone(),
            None => new_null_array(field.data_type(), num_rows),
        })
        .collect();

    with_row_count(schema.clone(), columns, num_rows)
}

fn with_row_count(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch, ArrowError> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(schema, columns, &options)
}
