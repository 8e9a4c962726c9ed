use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `{canonical_path, file_size_bytes, mtime_ticks, sha256_hex}` as described
/// for a single dependency file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub canonical_path: String,
    pub file_size_bytes: u64,
    pub mtime_ticks: i128,
    pub sha256_hex: String,
}

/// An ordered sequence of file fingerprints plus the aggregate digest over
/// their sorted `"<canonical_path>|<sha256_hex>\n"` rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub files: Vec<FileFingerprint>,
    pub aggregate_sha256_hex: String,
}

impl DependencyManifest {
    /// Recomputes the aggregate digest from `files` and compares against the
    /// stored value (invariant I1).
    pub fn is_self_consistent(&self) -> bool {
        self.aggregate_sha256_hex == Self::digest_rows(&self.files)
    }

    /// Builds the sorted-row aggregate digest (order of `files` is irrelevant
    /// to the result, per the manifest order-independence property).
    pub fn digest_rows(files: &[FileFingerprint]) -> String {
        let mut rows: Vec<String> = files
            .iter()
            .map(|f| format!("{}|{}\n", f.canonical_path, f.sha256_hex))
            .collect();
        rows.sort();
        let mut hasher = Sha256::new();
        for row in &rows {
            hasher.update(row.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(path: &str, hash: &str) -> FileFingerprint {
        FileFingerprint {
            canonical_path: path.to_string(),
            file_size_bytes: 0,
            mtime_ticks: 0,
            sha256_hex: hash.to_string(),
        }
    }

    #[test]
    fn digest_is_order_independent() {
        let a = vec![fp("/a", "h1"), fp("/b", "h2")];
        let b = vec![fp("/b", "h2"), fp("/a", "h1")];
        assert_eq!(
            DependencyManifest::digest_rows(&a),
            DependencyManifest::digest_rows(&b)
        );
    }

    #[test]
    fn manifest_self_consistency() {
        let files = vec![fp("/a", "h1")];
        let aggregate = DependencyManifest::digest_rows(&files);
        let manifest = DependencyManifest {
            files,
            aggregate_sha256_hex: aggregate,
        };
        assert!(manifest.is_self_consistent());
    }
}
