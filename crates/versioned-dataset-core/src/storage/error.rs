//! Storage error types.

use std::io;

use snafu::{Backtrace, prelude::*};

/// Failures of the local dataset store.
///
/// Every variant that touches the filesystem records the absolute path
/// involved and the underlying [`io::Error`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// Nothing exists at `path`.
    #[snafu(display("No such file: {path}"))]
    NotFound {
        /// Absolute path that was looked up.
        path: String,
        /// I/O error reported by the filesystem.
        source: io::Error,
        /// Captured at the failing call.
        backtrace: Backtrace,
    },

    /// A create-only write found an existing file at `path`.
    #[snafu(display("Refusing to overwrite existing file {path}"))]
    AlreadyExists {
        /// Absolute path of the existing file.
        path: String,
        /// I/O error reported by the filesystem.
        source: io::Error,
        /// Captured at the failing call.
        backtrace: Backtrace,
    },

    /// Any other filesystem failure.
    #[snafu(display("I/O error at {path}: {source}"))]
    Io {
        /// Absolute path being accessed.
        path: String,
        /// I/O error reported by the filesystem.
        source: io::Error,
        /// Captured at the failing call.
        backtrace: Backtrace,
    },

    /// The location string names a remote scheme.
    #[snafu(display("Unsupported storage scheme {scheme}:// (only local paths are supported)"))]
    UnsupportedScheme {
        /// Rejected URI scheme.
        scheme: String,
        /// Captured at the failing call.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Absolute path involved, if the error came from the filesystem.
    pub fn path(&self) -> Option<&str> {
        match self {
            StorageError::NotFound { path, .. }
            | StorageError::AlreadyExists { path, .. }
            | StorageError::Io { path, .. } => Some(path),
            StorageError::UnsupportedScheme { .. } => None,
        }
    }

    /// Classify a failed filesystem call on `path`.
    pub(crate) fn from_io(source: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        let backtrace = Backtrace::capture();
        match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                path,
                source,
                backtrace,
            },
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                path,
                source,
                backtrace,
            },
            _ => StorageError::Io {
                path,
                source,
                backtrace,
            },
        }
    }
}
