//! Board runtime lock (§4.4): pins exactly one `{hash, canonical_path,
//! binding_id}` triple for the process lifetime and resolves `BIND`
//! declarations into registered contract/wave hashes.

use crate::fingerprint::canonicalize_path;
use crate::registry::Registry;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tsiemene_dsl::{parse_board_dsl, BoardInstruction};
use tsiemene_types::TsiemeneError;

/// The triple pinned by the first successful `init` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedBoard {
    pub hash: String,
    pub canonical_path: PathBuf,
    pub binding_id: String,
}

struct Bound {
    locked: LockedBoard,
    contract_hash: String,
    wave_hash: String,
}

/// Owns the board registry plus the contract/wave registries a bound
/// board resolves into, and enforces the one-board-per-process rule.
///
/// This is not a global singleton in this crate: the CLI constructs one
/// `BoardRuntime` in its root context and threads it through, per the
/// "explicitly constructed `Arc<...>`" design note — avoiding an implicit
/// `once_cell::sync::Lazy` static where a caller-supplied handle suffices.
pub struct BoardRuntime {
    board_registry: Registry<BoardInstruction>,
    contract_registry: Registry<tsiemene_dsl::ContractInstruction>,
    wave_registry: Registry<Vec<tsiemene_types::WaveProfile>>,
    bound: Mutex<Option<Bound>>,
}

impl Default for BoardRuntime {
    fn default() -> Self {
        BoardRuntime {
            board_registry: Registry::new(),
            contract_registry: Registry::new(),
            wave_registry: Registry::new(),
            bound: Mutex::new(None),
        }
    }
}

impl BoardRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract_registry(&self) -> &Registry<tsiemene_dsl::ContractInstruction> {
        &self.contract_registry
    }

    pub fn wave_registry(&self) -> &Registry<Vec<tsiemene_types::WaveProfile>> {
        &self.wave_registry
    }

    pub fn locked(&self) -> Option<LockedBoard> {
        self.bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|b| b.locked.clone())
    }

    /// The `{contract_hash, wave_hash}` resolved for the locked binding.
    pub fn bound_hashes(&self) -> Option<(String, String)> {
        self.bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|b| (b.contract_hash.clone(), b.wave_hash.clone()))
    }

    /// First call pins `{hash, canonical_path, binding_id}` and resolves the
    /// bind; subsequent calls are a no-op if all three fields match, fatal
    /// otherwise (I4).
    pub fn init(&self, path: &Path, binding_id: &str) -> Result<(), TsiemeneError> {
        let canonical = canonicalize_path(path)?;
        let hash = self.board_registry.register_file(&canonical)?;

        let mut guard = self.bound.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.as_ref() {
            if existing.locked.hash == hash
                && existing.locked.canonical_path == canonical
                && existing.locked.binding_id == binding_id
            {
                return Ok(());
            }
            return Err(TsiemeneError::ImmutableLockViolation(format!(
                "board already locked to {{hash={}, path={:?}, binding={}}}, \
                 rejecting re-init with {{hash={hash}, path={canonical:?}, binding={binding_id}}}",
                existing.locked.hash, existing.locked.canonical_path, existing.locked.binding_id
            )));
        }

        let record = self
            .board_registry
            .itself(&hash)
            .expect("just registered");
        let instruction = record.decoded(|text, path| parse_board_dsl(text, path))?;

        let bind = instruction.bind(binding_id).ok_or_else(|| {
            TsiemeneError::ImmutableLockViolation(format!(
                "board declares no BIND for binding id {binding_id:?}"
            ))
        })?;
        let contract_path = instruction.contract_path(&bind.contract_id).ok_or_else(|| {
            TsiemeneError::ImmutableLockViolation(format!(
                "bind {binding_id:?} references unknown contract id {:?}",
                bind.contract_id
            ))
        })?;
        let wave_path = instruction.wave_path(&bind.wave_id).ok_or_else(|| {
            TsiemeneError::ImmutableLockViolation(format!(
                "bind {binding_id:?} references unknown wave id {:?}",
                bind.wave_id
            ))
        })?;

        let contract_base = record.config_folder.clone();
        let contract_hash = self
            .contract_registry
            .register_file(&contract_base.join(contract_path))?;
        let wave_hash = self
            .wave_registry
            .register_file(&contract_base.join(wave_path))?;
        self.contract_registry.assert_intact_or_fail_fast(&contract_hash)?;
        self.wave_registry.assert_intact_or_fail_fast(&wave_hash)?;

        *guard = Some(Bound {
            locked: LockedBoard {
                hash,
                canonical_path: canonical,
                binding_id: binding_id.to_string(),
            },
            contract_hash,
            wave_hash,
        });
        Ok(())
    }

    /// Re-verifies the board, the locked bind's contract and wave, and then
    /// every registry globally.
    pub fn assert_locked_runtime_intact_or_fail_fast(&self) -> Result<(), TsiemeneError> {
        let guard = self.bound.lock().unwrap_or_else(|e| e.into_inner());
        let bound = guard.as_ref().ok_or_else(|| {
            TsiemeneError::RegistryCorruption("board runtime is not locked".to_string())
        })?;
        self.board_registry
            .assert_intact_or_fail_fast(&bound.locked.hash)?;
        self.contract_registry
            .assert_intact_or_fail_fast(&bound.contract_hash)?;
        self.wave_registry
            .assert_intact_or_fail_fast(&bound.wave_hash)?;
        drop(guard);
        self.board_registry.assert_registry_intact_or_fail_fast()?;
        self.contract_registry.assert_registry_intact_or_fail_fast()?;
        self.wave_registry.assert_registry_intact_or_fail_fast()
    }
}
