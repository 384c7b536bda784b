//! Version history of a dataset.
//!
//! Every write produces one immutable JSON [`Commit`] under `_versions/`,
//! named by its zero-padded version, and then advances the `CURRENT`
//! pointer. Replaying commits `1..=v` through [`DatasetState::apply_commit`]
//! yields the fragments and metadata visible at version `v`, so any
//! historical version can be materialized again.
//!
//! Writers guard each commit with the version they read (optimistic
//! concurrency); a stale writer gets [`CommitError::Conflict`]. Commit
//! timestamps never decrease along the history.
//!
//! ```text
//! dataset_root/
//!   _versions/
//!     CURRENT            "2\n"
//!     0000000001.json
//!     0000000002.json
//!   data/
//!     frag-<hash>.parquet
//! ```
//!
//! A commit file holds a single value such as:
//!
//! ```json
//! {
//!   "version": 2,
//!   "base_version": 1,
//!   "timestamp": "2023-06-01T00:00:00Z",
//!   "actions": [
//!     {
//!       "AddFragment": {
//!         "fragment_id": "frag-3f2a9c0d1e4b5a697887766554433221",
//!         "path": "data/frag-3f2a9c0d1e4b5a697887766554433221.parquet",
//!         "row_count": 1024,
//!         "format": "parquet"
//!       }
//!     }
//!   ]
//! }
//! ```
pub mod actions;
pub mod dataset_metadata;
pub mod dataset_state;
pub mod fragments;
pub mod log_store;

pub use actions::{Commit, LogAction};
pub use dataset_metadata::{DATASET_FORMAT_VERSION, DatasetMeta};
pub use dataset_state::DatasetState;
pub use fragments::{FileFormat, FragmentId, FragmentMeta, fragment_id_v1};
pub use log_store::TransactionLogStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

use crate::storage::StorageError;

/// One entry of a dataset's version history.
///
/// Records are produced by the log (one per commit) and are immutable once
/// written. A version list is ordered by increasing `version`, which also
/// means non-decreasing `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version identifier (starts at 1, unique per dataset).
    pub version: u64,
    /// Instant at which the version was committed.
    pub timestamp: DateTime<Utc>,
}

impl From<&Commit> for VersionRecord {
    fn from(commit: &Commit) -> Self {
        VersionRecord {
            version: commit.version,
            timestamp: commit.timestamp,
        }
    }
}

/// Failures while reading, replaying or extending the version history.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommitError {
    /// Another writer committed since the caller last read `CURRENT`.
    #[snafu(display("Stale write: built on version {expected} but the dataset is at {found}"))]
    Conflict {
        /// Version the write was built on.
        expected: u64,
        /// Version found in `CURRENT`.
        found: u64,
        /// Captured where the conflict was detected.
        backtrace: Backtrace,
    },

    /// An explicit commit timestamp would move the history backwards.
    #[snafu(display(
        "Commit timestamp {timestamp} for version {version} is earlier than the previous commit at {previous}"
    ))]
    NonMonotonicTimestamp {
        /// Version that was about to be committed.
        version: u64,
        /// Requested commit timestamp.
        timestamp: DateTime<Utc>,
        /// Timestamp of the previous commit.
        previous: DateTime<Utc>,
        /// Captured where the timestamp was rejected.
        backtrace: Backtrace,
    },

    /// The requested version is not part of the committed history.
    #[snafu(display("Version {version} does not exist (CURRENT is {current})"))]
    VersionNotFound {
        /// Requested version.
        version: u64,
        /// Latest committed version.
        current: u64,
    },

    /// Reading or writing a log file failed.
    #[snafu(display("Version log I/O failed: {source}"))]
    Storage {
        /// Storage failure; carries its own backtrace.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// A log file exists but cannot be trusted (bad JSON, wrong version,
    /// non-contiguous replay).
    #[snafu(display("Corrupt version log: {msg}"))]
    CorruptState {
        /// What was wrong.
        msg: String,
        /// Captured where the corruption was found.
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use crate::transaction_log::*;

    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::{TimeZone, Utc};

    fn utc_datetime(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .expect("valid UTC timestamp")
    }

    #[test]
    fn commit_json_roundtrip_with_schema() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("label", DataType::Utf8, true),
        ]);
        let meta = DatasetMeta {
            schema: Some(schema),
            created_at: utc_datetime(2023, 1, 1),
            format_version: DATASET_FORMAT_VERSION,
            properties: Default::default(),
        };
        let fragment = FragmentMeta {
            fragment_id: FragmentId("frag-0001".to_string()),
            path: "data/frag-0001.parquet".to_string(),
            row_count: 3,
            format: FileFormat::Parquet,
        };

        let commit = Commit {
            version: 1,
            base_version: 0,
            timestamp: utc_datetime(2023, 1, 1),
            actions: vec![
                LogAction::UpdateDatasetMeta(meta),
                LogAction::AddFragment(fragment),
            ],
        };

        let json = serde_json::to_string_pretty(&commit).expect("serialize commit");
        let decoded: Commit = serde_json::from_str(&json).expect("deserialize commit");

        assert_eq!(commit, decoded);
    }

    #[test]
    fn version_record_from_commit_keeps_version_and_timestamp() {
        let commit = Commit {
            version: 4,
            base_version: 3,
            timestamp: utc_datetime(2023, 6, 1),
            actions: vec![],
        };

        let record = VersionRecord::from(&commit);

        assert_eq!(record.version, 4);
        assert_eq!(record.timestamp, utc_datetime(2023, 6, 1));
    }

    #[test]
    fn remove_fragment_action_serializes_transparent_id() {
        let action = LogAction::RemoveFragment {
            fragment_id: FragmentId("frag-gone".to_string()),
        };

        let json = serde_json::to_string(&action).expect("serialize");

        assert_eq!(json, r#"{"RemoveFragment":{"fragment_id":"frag-gone"}}"#);
    }

    #[test]
    fn file_format_serializes_lowercase() {
        let json = serde_json::to_string(&FileFormat::Parquet).expect("serialize");
        assert_eq!(json, r#""parquet""#);
        assert_eq!(FileFormat::default(), FileFormat::Parquet);
    }
}
