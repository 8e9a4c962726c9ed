//! Fingerprint engine (§4.2): canonicalizes paths, hashes file bytes with
//! SHA-256, and builds/re-verifies dependency manifests.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tsiemene_types::{DependencyManifest, FileFingerprint, TsiemeneError};

/// Absolutizes and weakly-canonicalizes `path`; on canonicalization failure
/// (e.g. the file does not exist yet), falls back to the lexically
/// normalized absolute path. Empty/whitespace-only paths are rejected.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, TsiemeneError> {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return Err(TsiemeneError::ManifestMismatch {
            path: path.to_path_buf(),
            reason: "empty path".to_string(),
        });
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(TsiemeneError::Io)?
            .join(path)
    };
    match fs::canonicalize(&absolute) {
        Ok(canon) => Ok(canon),
        Err(_) => Ok(lexically_normalize(&absolute)),
    }
}

fn lexically_normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn mtime_ticks(metadata: &fs::Metadata) -> Result<i128, TsiemeneError> {
    let modified = metadata.modified().map_err(TsiemeneError::Io)?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i128,
        Err(e) => -(e.duration().as_nanos() as i128),
    })
}

fn sha256_file(path: &Path) -> Result<String, TsiemeneError> {
    let bytes = fs::read(path).map_err(TsiemeneError::Io)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Computes a fresh [`FileFingerprint`] for `path` by reading it from disk.
pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint, TsiemeneError> {
    let canonical = canonicalize_path(path)?;
    let metadata = fs::metadata(&canonical).map_err(TsiemeneError::Io)?;
    if !metadata.is_file() {
        return Err(TsiemeneError::ManifestMismatch {
            path: canonical,
            reason: "not a regular file".to_string(),
        });
    }
    Ok(FileFingerprint {
        canonical_path: canonical.to_string_lossy().into_owned(),
        file_size_bytes: metadata.len(),
        mtime_ticks: mtime_ticks(&metadata)?,
        sha256_hex: sha256_file(&canonical)?,
    })
}

/// Builds a [`DependencyManifest`] from a set of dependency paths, in the
/// order given (order does not affect the resulting aggregate digest).
pub fn build_manifest(paths: &[PathBuf]) -> Result<DependencyManifest, TsiemeneError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(fingerprint_file(path)?);
    }
    let aggregate_sha256_hex = DependencyManifest::digest_rows(&files);
    Ok(DependencyManifest {
        files,
        aggregate_sha256_hex,
    })
}

/// Re-verifies `manifest` against disk (§4.2's `assert_intact_or_fail_fast`):
/// every file must still exist as a regular file; if size or mtime changed,
/// the content hash is recomputed and compared; then the aggregate digest is
/// recomputed and compared. Any deviation is a fatal `ManifestMismatch`.
pub fn assert_intact(manifest: &DependencyManifest) -> Result<(), TsiemeneError> {
    let mut recomputed = Vec::with_capacity(manifest.files.len());
    for expected in &manifest.files {
        let path = PathBuf::from(&expected.canonical_path);
        let metadata = fs::metadata(&path).map_err(|e| TsiemeneError::ManifestMismatch {
            path: path.clone(),
            reason: format!("file missing or inaccessible: {e}"),
        })?;
        if !metadata.is_file() {
            return Err(TsiemeneError::ManifestMismatch {
                path,
                reason: "no longer a regular file".to_string(),
            });
        }
        let size = metadata.len();
        let mtime = mtime_ticks(&metadata)?;
        let sha256_hex = if size != expected.file_size_bytes || mtime != expected.mtime_ticks {
            sha256_file(&path)?
        } else {
            expected.sha256_hex.clone()
        };
        if sha256_hex != expected.sha256_hex {
            return Err(TsiemeneError::ManifestMismatch {
                path,
                reason: "content hash changed".to_string(),
            });
        }
        recomputed.push(FileFingerprint {
            canonical_path: expected.canonical_path.clone(),
            file_size_bytes: size,
            mtime_ticks: mtime,
            sha256_hex,
        });
    }
    let aggregate = DependencyManifest::digest_rows(&recomputed);
    if aggregate != manifest.aggregate_sha256_hex {
        return Err(TsiemeneError::ManifestMismatch {
            path: PathBuf::from("<manifest>"),
            reason: "aggregate digest mismatch".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fingerprint_is_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let a = fingerprint_file(&path).unwrap();
        let b = fingerprint_file(&path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn perturbing_a_byte_flips_the_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let before = fingerprint_file(&path).unwrap();
        std::fs::write(&path, b"hellp").unwrap();
        let after = fingerprint_file(&path).unwrap();
        assert_ne!(before.sha256_hex, after.sha256_hex);
    }

    #[test]
    fn manifest_order_independence() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let m1 = build_manifest(&[a.clone(), b.clone()]).unwrap();
        let m2 = build_manifest(&[b, a]).unwrap();
        assert_eq!(m1.aggregate_sha256_hex, m2.aggregate_sha256_hex);
    }

    #[test]
    fn assert_intact_detects_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let manifest = build_manifest(&[path.clone()]).unwrap();
        assert!(assert_intact(&manifest).is_ok());

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"!").unwrap();
        drop(file);
        assert!(assert_intact(&manifest).is_err());
    }

    #[test]
    fn assert_intact_detects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let manifest = build_manifest(&[path.clone()]).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(assert_intact(&manifest).is_err());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(canonicalize_path(Path::new("")).is_err());
    }
}
