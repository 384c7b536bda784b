//! Core engine for a versioned columnar dataset with time travel.
//!
//! This crate provides the foundational pieces for `versioned-dataset`:
//!
//! - An append-only version log with version-guard optimistic concurrency
//!   control and non-decreasing commit timestamps (`transaction_log` module).
//! - A local dataset of immutable Parquet fragments whose every committed
//!   version stays readable as a pinned, read-only view (`dataset` module).
//! - Time-travel helpers that resolve "the version as of instant T" and
//!   evaluate a metric across many versions into one Arrow table
//!   (`versioning` module).
//! - Filesystem utilities for the on-disk layout (log directory, CURRENT
//!   pointer, fragment paths) (`storage` module).
//!
//! The versioning helpers only depend on the [`versioning::VersionedDataset`]
//! trait, so other stores can plug in without touching the local layout.
#![deny(missing_docs)]
pub mod dataset;
pub mod storage;
pub mod transaction_log;
pub mod versioning;
