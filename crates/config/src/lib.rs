//! Global `.config` space (§4.5): an INI-like file with `[SECTION]` headers
//! and `key = value` lines, validated against the required-key and
//! migration rules in §6.

mod ini;
mod validate;

pub use ini::{parse_ini, GlobalConfig};
pub use validate::{assert_exchange_type_unchanged, validate, ConfigError, ExchangeType};

use std::path::{Path, PathBuf};
use tsiemene_types::TsiemeneError;

impl From<ConfigError> for TsiemeneError {
    fn from(value: ConfigError) -> Self {
        TsiemeneError::ConfigError(value.to_string())
    }
}

/// Loads and validates the `.config` file at `path`.
pub fn load_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config = parse_ini(&text);
    validate::validate(&config)?;
    Ok(config)
}

/// Resolves the `.config` path the teacher's CLI precedence order applies:
/// an explicit override, then `TSIEMENE_CONFIG`, then `<folder>/.config`.
pub fn resolve_config_path(explicit: Option<&Path>, folder: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(env_path) = std::env::var("TSIEMENE_CONFIG") {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }
    folder.join(".config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_explicit_path_first() {
        let explicit = PathBuf::from("/explicit/.config");
        let folder = PathBuf::from("/folder");
        assert_eq!(resolve_config_path(Some(&explicit), &folder), explicit);
    }

    #[test]
    fn falls_back_to_folder_default() {
        // SAFETY: test-only env var manipulation, not shared across threads here.
        std::env::remove_var("TSIEMENE_CONFIG");
        let folder = PathBuf::from("/folder");
        assert_eq!(
            resolve_config_path(None, &folder),
            PathBuf::from("/folder/.config")
        );
    }

    #[test]
    fn loads_a_valid_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config");
        std::fs::write(
            &path,
            "[GENERAL]\n\
             exchange_type = TEST\n\
             board_config_key = board.dsl\n\
             board_binding_key = stable_pretrain\n\
             iinuji_logs_buffer_capacity = 1024\n\
             [DATA_LOADER]\n\
             dataloader_workers = 2\n\
             dataloader_force_rebuild_cache = false\n\
             dataloader_csv_bootstrap_deltas = 2\n\
             price_tolerance = 0.0\n\
             volume_tolerance = 0.0\n\
             [TEST_EXCHANGE]\n\
             api_key = k\n\
             api_secret = s\n\
             base_url = https://example.test\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.get("GENERAL", "exchange_type"), Some("TEST"));
    }

    #[test]
    fn surfaces_an_io_error_for_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(load_config(&missing).is_err());
    }
}
