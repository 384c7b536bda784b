//! Log actions and commit payload definitions.
//!
//! Each commit file stores a [`Commit`] containing ordered [`LogAction`]
//! values that evolve dataset state: adding/removing fragments or replacing
//! dataset metadata.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transaction_log::{
    dataset_metadata::DatasetMeta,
    fragments::{FragmentId, FragmentMeta},
};

/// An action recorded in a commit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogAction {
    /// Add or replace a data fragment.
    AddFragment(FragmentMeta),

    /// Remove a fragment by its logical ID.
    RemoveFragment {
        /// Logical identifier of the fragment to remove.
        fragment_id: FragmentId,
    },

    /// Replace dataset-level metadata (full replacement).
    UpdateDatasetMeta(DatasetMeta),
}

/// A single, immutable commit in the version log.
///
/// Commits are written to files such as `_versions/0000000001.json`. The
/// version field must match the file name; `base_version` records what the
/// writer believed was the current version when the commit was prepared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// The version number of this commit (monotonic, starting from 1).
    pub version: u64,

    /// The version the writer believed was current when preparing this commit.
    pub base_version: u64,

    /// Commit timestamp, stored as RFC3339 UTC.
    pub timestamp: DateTime<Utc>,

    /// Ordered list of actions applied by this commit.
    pub actions: Vec<LogAction>,
}
