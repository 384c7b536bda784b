//! Error types and SNAFU context selectors for timestamp normalization,
//! version resolution and metric aggregation.

use arrow::{datatypes::TimeUnit, error::ArrowError};
use chrono::{DateTime, NaiveDateTime, Utc};
use snafu::prelude::*;

use crate::versioning::BoxError;

/// Errors raised by the time-travel helpers.
///
/// Store and metric failures carry the original error as `source`, boxed but
/// otherwise untouched, so callers can downcast it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VersioningError {
    /// A dynamically typed timestamp had a type that cannot be normalized.
    #[snafu(display("Unrecognized version timestamp {input} of type {observed_type}"))]
    TypeMismatch {
        /// Rendered input value.
        input: String,
        /// Observed type of the input.
        observed_type: &'static str,
    },

    /// Text input is not a valid ISO-8601 timestamp.
    #[snafu(display("Cannot parse {input:?} as an ISO-8601 timestamp: {source}"))]
    Parse {
        /// Offending text.
        input: String,
        /// Parser error for the last attempted format.
        source: chrono::ParseError,
    },

    /// Epoch value does not fit in the supported calendar range.
    #[snafu(display("Epoch value {value} ({unit:?}) is out of range"))]
    EpochOutOfRange {
        /// Raw epoch value.
        value: i64,
        /// Unit of `value`.
        unit: TimeUnit,
    },

    /// Naive timestamp falls in a gap of the configured zone (for example a
    /// daylight-saving jump).
    #[snafu(display("Local time {input} does not exist in timezone {zone}"))]
    NonexistentLocalTime {
        /// Naive input.
        input: NaiveDateTime,
        /// Zone the input was interpreted in.
        zone: String,
    },

    /// Configured fixed offset is outside ±24h.
    #[snafu(display("Invalid fixed UTC offset of {offset_seconds} seconds"))]
    InvalidOffset {
        /// Configured offset.
        offset_seconds: i32,
    },

    /// Query instant precedes the first version, or the dataset has none.
    #[snafu(display("{}", match earliest {
        Some(first) => format!("{timestamp} is earlier than the first version of this dataset ({first})"),
        None => format!("{timestamp} cannot be resolved: the dataset has no versions"),
    }))]
    OutOfRange {
        /// Normalized query instant.
        timestamp: DateTime<Utc>,
        /// Commit instant of the first version, if any.
        earliest: Option<DateTime<Utc>>,
    },

    /// A metric result already contains the version column.
    #[snafu(display("{column} already in metric output for version {version}"))]
    SchemaConflict {
        /// Version column name.
        column: String,
        /// Version whose result conflicted.
        version: u64,
    },

    /// The dataset store failed to list versions or check one out.
    #[snafu(display("Dataset store error: {source}"))]
    Store {
        /// Error returned by the store.
        source: BoxError,
    },

    /// The metric function failed.
    #[snafu(display("Metric failed for version {version}: {source}"))]
    Metric {
        /// Version being evaluated.
        version: u64,
        /// Error returned by the metric function.
        source: BoxError,
    },

    /// Per-version results could not be merged into one table.
    #[snafu(display("Cannot merge metric results: {source}"))]
    Merge {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The worker pool for parallel evaluation could not be built.
    #[snafu(display("Failed to build rayon thread pool: {source}"))]
    ThreadPool {
        /// Underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },
}
