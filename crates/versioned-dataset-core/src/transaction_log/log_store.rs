//! Reading and extending the `_versions/` directory.
//!
//! A missing `CURRENT` file means a fresh dataset at version 0. Commit files
//! are created with create-only writes, so each version is written once;
//! `CURRENT` is then replaced atomically to publish it. Commit timestamps
//! are kept non-decreasing so readers can resolve versions by instant.
use chrono::{DateTime, Utc};
use log::{debug, warn};
use snafu::{Backtrace, prelude::*};

use crate::storage::{self, DatasetLocation, StorageError, layout};
use crate::transaction_log::actions::{Commit, LogAction};
use crate::transaction_log::*;

/// Version log of one dataset root.
#[derive(Debug, Clone)]
pub struct TransactionLogStore {
    location: DatasetLocation,
}

impl TransactionLogStore {
    /// Log rooted at `location`. Nothing is read until first use.
    pub fn new(location: DatasetLocation) -> Self {
        Self { location }
    }

    /// Dataset root this log belongs to.
    pub fn location(&self) -> &DatasetLocation {
        &self.location
    }

    fn corrupt(msg: String) -> CommitError {
        CommitError::CorruptState {
            msg,
            backtrace: Backtrace::capture(),
        }
    }

    /// Read and validate the commit file of `version`.
    pub async fn load_commit(&self, version: u64) -> Result<Commit, CommitError> {
        let rel = layout::commit_rel_path(version);
        let json = storage::read_to_string(self.location.as_ref(), &rel)
            .await
            .context(StorageSnafu)?;

        let commit: Commit = serde_json::from_str(&json)
            .map_err(|e| Self::corrupt(format!("commit {version} is not valid JSON: {e}")))?;

        ensure!(
            commit.version == version,
            CorruptStateSnafu {
                msg: format!(
                    "commit file for version {version} records version {}",
                    commit.version
                ),
            }
        );
        Ok(commit)
    }

    /// Latest published version, or 0 when nothing has been committed.
    pub async fn load_current_version(&self) -> Result<u64, CommitError> {
        let rel = layout::current_rel_path();

        let contents = match storage::read_to_string(self.location.as_ref(), &rel).await {
            Ok(s) => s,
            Err(StorageError::NotFound { .. }) => return Ok(0),
            Err(source) => return Err(source).context(StorageSnafu),
        };

        let pointer = contents.trim();
        ensure!(
            !pointer.is_empty(),
            CorruptStateSnafu {
                msg: "CURRENT is empty".to_string(),
            }
        );
        pointer
            .parse::<u64>()
            .map_err(|e| Self::corrupt(format!("CURRENT holds {pointer:?}: {e}")))
    }

    /// Every published version with its commit instant, oldest first.
    ///
    /// A published version without a commit file is reported as
    /// `CorruptState`.
    pub async fn list_versions(&self) -> Result<Vec<VersionRecord>, CommitError> {
        let current = self.load_current_version().await?;

        let mut versions = Vec::new();
        for v in 1..=current {
            let commit = match self.load_commit(v).await {
                Ok(commit) => commit,
                Err(CommitError::Storage {
                    source: StorageError::NotFound { .. },
                }) => {
                    return CorruptStateSnafu {
                        msg: format!("CURRENT is {current} but commit {v} is missing"),
                    }
                    .fail();
                }
                Err(e) => return Err(e),
            };
            versions.push(VersionRecord::from(&commit));
        }
        Ok(versions)
    }

    /// Commit `actions` on top of `expected`, stamped with the wall clock.
    ///
    /// A clock reading earlier than the previous commit is replaced by the
    /// previous commit's timestamp.
    ///
    /// Two writers racing past the `CURRENT` check are separated by the
    /// create-only commit write: the loser gets `CommitError::Storage`
    /// wrapping `StorageError::AlreadyExists` and should reload and retry.
    /// A crash after the commit file is written but before `CURRENT` moves
    /// leaves an unpublished file that readers ignore; it blocks that
    /// version number until removed.
    pub async fn commit_with_expected_version(
        &self,
        expected: u64,
        actions: Vec<LogAction>,
    ) -> Result<u64, CommitError> {
        self.commit_inner(expected, None, actions).await
    }

    /// Like [`Self::commit_with_expected_version`] with an explicit commit
    /// instant. Fails with `NonMonotonicTimestamp` if `timestamp` is before
    /// the previous commit; an equal instant is accepted.
    pub async fn commit_with_expected_version_at(
        &self,
        expected: u64,
        timestamp: DateTime<Utc>,
        actions: Vec<LogAction>,
    ) -> Result<u64, CommitError> {
        self.commit_inner(expected, Some(timestamp), actions).await
    }

    async fn commit_inner(
        &self,
        expected: u64,
        requested: Option<DateTime<Utc>>,
        actions: Vec<LogAction>,
    ) -> Result<u64, CommitError> {
        let found = self.load_current_version().await?;
        ensure!(found == expected, ConflictSnafu { expected, found });

        let version = expected.checked_add(1).context(CorruptStateSnafu {
            msg: "version counter overflow".to_string(),
        })?;

        let previous = match expected {
            0 => None,
            v => Some(self.load_commit(v).await?.timestamp),
        };
        let timestamp = commit_timestamp(version, requested, previous, Utc::now())?;

        let commit = Commit {
            version,
            base_version: expected,
            timestamp,
            actions,
        };
        let json = serde_json::to_vec(&commit)
            .map_err(|e| Self::corrupt(format!("cannot encode commit {version}: {e}")))?;

        storage::write_new(
            self.location.as_ref(),
            &layout::commit_rel_path(version),
            &json,
        )
        .await
        .context(StorageSnafu)?;

        storage::write_atomic(
            self.location.as_ref(),
            &layout::current_rel_path(),
            format!("{version}\n").as_bytes(),
        )
        .await
        .context(StorageSnafu)?;

        debug!("committed version {version} at {timestamp} to {}", self.location);
        Ok(version)
    }
}

/// Instant to record for `version`, given the caller's request, the previous
/// commit's instant and the current wall clock.
fn commit_timestamp(
    version: u64,
    requested: Option<DateTime<Utc>>,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, CommitError> {
    match (requested, previous) {
        (Some(timestamp), Some(previous)) => {
            ensure!(
                timestamp >= previous,
                NonMonotonicTimestampSnafu {
                    version,
                    timestamp,
                    previous,
                }
            );
            Ok(timestamp)
        }
        (Some(timestamp), None) => Ok(timestamp),
        (None, Some(previous)) if now < previous => {
            warn!(
                "clock reads {now}, before the previous commit at {previous}; \
                 stamping version {version} with {previous}"
            );
            Ok(previous)
        }
        (None, _) => Ok(now),
    }
}
