//! On-disk layout helpers for a dataset root.
//!
//! All *relative* path conventions live here:
//! - version log directory and commit file naming (`_versions/`)
//! - conventional data directory (`data/`)
//!
//! Callers join these with a [`crate::storage::DatasetLocation`] before doing IO.

use std::path::PathBuf;

// ====================
// Data layout
// ====================

/// Directory where data fragments are stored.
pub const DATA_DIR_NAME: &str = "data";

/// File extension used for Parquet fragments.
pub const FRAGMENT_EXT: &str = "parquet";

/// Relative path: `data/`
pub fn data_rel_dir() -> PathBuf {
    PathBuf::from(DATA_DIR_NAME)
}

/// Relative path: `data/<fragment_id>.parquet`
pub fn fragment_rel_path(fragment_id: &str) -> PathBuf {
    data_rel_dir().join(format!("{fragment_id}.{FRAGMENT_EXT}"))
}

/// `/`-separated form of [`fragment_rel_path`], as recorded in the log.
pub fn fragment_rel_key(fragment_id: &str) -> String {
    format!("{DATA_DIR_NAME}/{fragment_id}.{FRAGMENT_EXT}")
}

// ====================
// Version log layout
// ====================

/// Name of the subdirectory containing the version log.
pub const LOG_DIR_NAME: &str = "_versions";

/// Name of the file that stores the current version pointer.
pub const CURRENT_FILE_NAME: &str = "CURRENT";

/// Number of digits used in zero-padded commit file names.
pub const COMMIT_FILENAME_DIGITS: usize = 10;

/// Relative path: `_versions/`
pub fn log_rel_dir() -> PathBuf {
    PathBuf::from(LOG_DIR_NAME)
}

/// Relative path: `_versions/CURRENT`
pub fn current_rel_path() -> PathBuf {
    log_rel_dir().join(CURRENT_FILE_NAME)
}

/// Relative path: `_versions/<zero-padded>.json`
pub fn commit_rel_path(version: u64) -> PathBuf {
    let file_name = format!("{:0width$}.json", version, width = COMMIT_FILENAME_DIGITS);
    log_rel_dir().join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_paths_are_zero_padded() {
        assert_eq!(
            commit_rel_path(7),
            PathBuf::from("_versions").join("0000000007.json")
        );
        assert_eq!(current_rel_path(), PathBuf::from("_versions").join("CURRENT"));
    }

    #[test]
    fn fragment_paths_live_under_data_dir() {
        assert_eq!(
            fragment_rel_path("frag-abc"),
            PathBuf::from("data").join("frag-abc.parquet")
        );
        assert_eq!(fragment_rel_key("frag-abc"), "data/frag-abc.parquet");
    }
}
