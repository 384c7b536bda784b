//! Fragment metadata recorded in the log.
//!
//! A fragment is one immutable Parquet file under `data/`. Versions reference
//! fragments; a fragment is never rewritten once committed.

use serde::{Deserialize, Serialize};

/// Logical identifier of a data fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(pub String);

impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk file format of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Apache Parquet.
    #[default]
    Parquet,
}

/// Metadata describing one committed fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    /// Logical identifier, unique within the dataset.
    pub fragment_id: FragmentId,
    /// Path relative to the dataset root (for example `data/frag-….parquet`).
    pub path: String,
    /// Number of rows stored in the fragment.
    pub row_count: u64,
    /// File format of the fragment.
    #[serde(default)]
    pub format: FileFormat,
}

/// Derive a deterministic fragment id for an append.
///
/// The id hashes the base version the write was prepared against together
/// with the encoded bytes, so a retried write of the same batch lands on the
/// same file while identical batches appended at different versions stay
/// distinct. Ids are `frag-` followed by 32 hex chars of the BLAKE3 digest.
pub fn fragment_id_v1(base_version: u64, data: &[u8]) -> FragmentId {
    let mut h = blake3::Hasher::new();
    h.update(b"fragment-id-v1");
    h.update(b"\0");
    h.update(&base_version.to_le_bytes());
    h.update(b"\0");
    h.update(data);
    let hex = h.finalize().to_hex();
    FragmentId(format!("frag-{}", &hex[..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_id_is_stable_for_same_input() {
        let a = fragment_id_v1(3, b"PAR1...PAR1");
        let b = fragment_id_v1(3, b"PAR1...PAR1");
        assert_eq!(a, b);
        assert!(a.0.starts_with("frag-"));
        assert_eq!(a.0.len(), "frag-".len() + 32);
    }

    #[test]
    fn fragment_id_differs_across_base_versions() {
        let a = fragment_id_v1(1, b"same bytes");
        let b = fragment_id_v1(2, b"same bytes");
        assert_ne!(a, b);
    }

    #[test]
    fn fragment_meta_format_defaults_to_parquet() {
        let json = r#"{ "fragment_id": "frag-1", "path": "data/frag-1.parquet", "row_count": 5 }"#;
        let meta: FragmentMeta = serde_json::from_str(json).expect("deserialize");
        assert_eq!(meta.format, FileFormat::Parquet);
        assert_eq!(meta.fragment_id.to_string(), "frag-1");
    }
}
