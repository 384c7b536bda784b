//! Dataset-level metadata recorded in the log.
//!
//! `LogAction::UpdateDatasetMeta` carries a full replacement of
//! [`DatasetMeta`]. The Arrow schema is optional until the first append,
//! which adopts the schema of the appended batch.
use std::{collections::BTreeMap, sync::Arc};

use arrow::datatypes::{Schema, SchemaRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current dataset metadata / log format version.
///
/// Bumped only on breaking changes to the on-disk JSON format.
pub const DATASET_FORMAT_VERSION: u32 = 1;

/// High-level dataset metadata stored in the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetMeta {
    /// Arrow schema shared by all live fragments, once established.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,

    /// Creation timestamp of the dataset, stored as RFC3339 UTC.
    pub created_at: DateTime<Utc>,

    /// Format version for future evolution of the log format.
    pub format_version: u32,

    /// Free-form user properties (owner, description, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl DatasetMeta {
    /// Metadata for a new dataset without a schema.
    pub fn new() -> Self {
        DatasetMeta {
            schema: None,
            created_at: Utc::now(),
            format_version: DATASET_FORMAT_VERSION,
            properties: BTreeMap::new(),
        }
    }

    /// Metadata for a new dataset with a schema fixed up front.
    pub fn with_schema(schema: Schema) -> Self {
        DatasetMeta {
            schema: Some(schema),
            ..Self::new()
        }
    }

    /// Set a user property, returning the updated metadata.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Shared Arrow schema, if one has been established.
    pub fn schema_ref(&self) -> Option<SchemaRef> {
        self.schema.clone().map(Arc::new)
    }
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field};

    #[test]
    fn new_meta_has_no_schema_and_current_format() {
        let meta = DatasetMeta::new();
        assert!(meta.schema.is_none());
        assert!(meta.schema_ref().is_none());
        assert_eq!(meta.format_version, DATASET_FORMAT_VERSION);
    }

    #[test]
    fn empty_properties_and_schema_are_skipped_on_serialize() {
        let json = serde_json::to_string(&DatasetMeta::new()).expect("serialize");
        assert!(!json.contains("properties"));
        assert!(!json.contains("schema"));
    }

    #[test]
    fn properties_and_schema_roundtrip() {
        let schema = Schema::new(vec![Field::new("score", DataType::Float64, true)]);
        let meta = DatasetMeta::with_schema(schema.clone()).with_property("owner", "metrics");

        let json = serde_json::to_string(&meta).expect("serialize");
        let decoded: DatasetMeta = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(decoded, meta);
        assert_eq!(decoded.schema_ref().as_deref(), Some(&schema));
        assert_eq!(decoded.properties.get("owner").map(String::as_str), Some("metrics"));
    }
}
