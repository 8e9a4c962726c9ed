//! Hash-keyed registries (§4.3): `register_*_file`, `*_itself`,
//! `assert_intact_or_fail_fast`, `has_*`, `registered_hashes`, with the
//! "build outside the lock, insert inside the lock" discipline and the
//! "no rebind" immutable-lock rule.

use crate::fingerprint::{build_manifest, canonicalize_path};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tsiemene_types::{DependencyManifest, TsiemeneError};

/// A single registry record: the raw DSL text plus a lazily-materialized,
/// shared decoded form behind a once-flag (I3).
pub struct Record<Decoded> {
    pub config_folder: PathBuf,
    pub config_file_path: PathBuf,
    pub config_file_path_canonical: PathBuf,
    pub dsl_text: String,
    pub dependency_manifest: DependencyManifest,
    decoded: OnceCell<Arc<Decoded>>,
}

impl<Decoded> Record<Decoded> {
    /// Returns the decoded form, materializing it on first access and
    /// caching it for the record's lifetime (I3). `decode` is called at
    /// most once even if multiple threads race to decode concurrently.
    pub fn decoded(
        &self,
        decode: impl FnOnce(&str, &Path) -> Result<Decoded, TsiemeneError>,
    ) -> Result<Arc<Decoded>, TsiemeneError> {
        self.decoded
            .get_or_try_init(|| {
                decode(&self.dsl_text, &self.config_file_path_canonical).map(Arc::new)
            })
            .cloned()
    }
}

struct Inner<Decoded> {
    path_to_hash: HashMap<PathBuf, String>,
    hash_to_record: HashMap<String, Arc<Record<Decoded>>>,
}

/// Generic hash-keyed registry shared by the contract, wave, and board
/// spaces. Each registry owns a dedicated mutex; the build step (read file,
/// compute manifest) runs without holding it.
pub struct Registry<Decoded> {
    inner: Mutex<Inner<Decoded>>,
}

impl<Decoded> Default for Registry<Decoded> {
    fn default() -> Self {
        Registry {
            inner: Mutex::new(Inner {
                path_to_hash: HashMap::new(),
                hash_to_record: HashMap::new(),
            }),
        }
    }
}

impl<Decoded> Registry<Decoded> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path`, returning its content hash. Idempotent per path:
    /// a second call for the same path returns the same hash without
    /// re-reading the record, and without ever rebinding the path to a
    /// different hash (I2).
    pub fn register_file(&self, path: &Path) -> Result<String, TsiemeneError> {
        let canonical = canonicalize_path(path)?;

        // Build outside the lock.
        let manifest = build_manifest(std::slice::from_ref(&canonical))?;
        let hash = manifest.files[0].sha256_hex.clone();
        let dsl_text = std::fs::read_to_string(&canonical).map_err(TsiemeneError::Io)?;
        let record = Arc::new(Record {
            config_folder: canonical
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            config_file_path: path.to_path_buf(),
            config_file_path_canonical: canonical.clone(),
            dsl_text,
            dependency_manifest: manifest,
            decoded: OnceCell::new(),
        });

        // Insert under the lock; enforce the no-rebind rule.
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing_hash) = guard.path_to_hash.get(&canonical) {
            if existing_hash != &hash {
                return Err(TsiemeneError::ImmutableLockViolation(format!(
                    "path {canonical:?} previously registered as {existing_hash} cannot rebind to {hash}"
                )));
            }
            return Ok(existing_hash.clone());
        }
        guard.path_to_hash.insert(canonical, hash.clone());
        guard.hash_to_record.entry(hash.clone()).or_insert(record);
        Ok(hash)
    }

    /// Returns the record for `hash`, if registered.
    pub fn itself(&self, hash: &str) -> Option<Arc<Record<Decoded>>> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.hash_to_record.get(hash).cloned()
    }

    pub fn has(&self, hash: &str) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.hash_to_record.contains_key(hash)
    }

    pub fn registered_hashes(&self) -> Vec<String> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.hash_to_record.keys().cloned().collect()
    }

    /// Re-verifies the single record for `hash` against disk.
    pub fn assert_intact_or_fail_fast(&self, hash: &str) -> Result<(), TsiemeneError> {
        let record = self.itself(hash).ok_or_else(|| {
            TsiemeneError::RegistryCorruption(format!("no record for hash {hash}"))
        })?;
        crate::fingerprint::assert_intact(&record.dependency_manifest)
    }

    /// Re-verifies every registered record, and that the path/hash maps are
    /// mutually consistent (no path pointing at a hash with no record, or
    /// vice versa — both would indicate registry corruption).
    pub fn assert_registry_intact_or_fail_fast(&self) -> Result<(), TsiemeneError> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for (path, hash) in guard.path_to_hash.iter() {
            if !guard.hash_to_record.contains_key(hash) {
                return Err(TsiemeneError::RegistryCorruption(format!(
                    "path {path:?} maps to hash {hash} with no backing record"
                )));
            }
        }
        let hashes: Vec<String> = guard.hash_to_record.keys().cloned().collect();
        drop(guard);
        for hash in hashes {
            self.assert_intact_or_fail_fast(&hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.dsl", "hello");
        let registry: Registry<()> = Registry::new();
        let h1 = registry.register_file(&path).unwrap();
        let h2 = registry.register_file(&path).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn rebinding_a_path_to_a_different_hash_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.dsl", "hello");
        let registry: Registry<()> = Registry::new();
        let h1 = registry.register_file(&path).unwrap();

        // Simulate a changed-file re-registration by forging a second path
        // entry with a different hash directly (the race the mutex guards
        // against); here we approximate by mutating the file and re-calling
        // register_file, which rebuilds the manifest out-of-band but still
        // must fail since the path is already bound to h1.
        std::fs::write(&path, "goodbye").unwrap();
        let err = registry.register_file(&path).unwrap_err();
        assert!(matches!(err, TsiemeneError::ImmutableLockViolation(_)));
        assert_eq!(registry.registered_hashes(), vec![h1]);
    }

    #[test]
    fn assert_intact_detects_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.dsl", "hello");
        let registry: Registry<()> = Registry::new();
        let hash = registry.register_file(&path).unwrap();
        assert!(registry.assert_intact_or_fail_fast(&hash).is_ok());
        std::fs::write(&path, "tampered").unwrap();
        assert!(registry.assert_intact_or_fail_fast(&hash).is_err());
    }

    #[test]
    fn registry_wide_assert_checks_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.dsl", "a");
        let b = write_file(&dir, "b.dsl", "b");
        let registry: Registry<()> = Registry::new();
        registry.register_file(&a).unwrap();
        registry.register_file(&b).unwrap();
        assert!(registry.assert_registry_intact_or_fail_fast().is_ok());
        std::fs::remove_file(&b).unwrap();
        assert!(registry.assert_registry_intact_or_fail_fast().is_err());
    }
}
