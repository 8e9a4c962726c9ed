//! Required-key and migration-error validation for the parsed `.config` (§6).

use crate::ini::GlobalConfig;
use std::path::PathBuf;
use tsiemene_common::text::parse_bool_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    Test,
    Real,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing required config key [{section}].{key}")]
    MissingKey { section: String, key: String },
    #[error("invalid value for [{section}].{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
    #[error("config key [{section}].{key} was removed{}", .replacement.as_ref().map(|r| format!("; use {r} instead")).unwrap_or_default())]
    RemovedKey {
        section: String,
        key: String,
        replacement: Option<String>,
    },
    #[error("exchange_type cannot change after the board has locked (was {old:?}, requested {new:?})")]
    ExchangeTypeChanged { old: ExchangeType, new: ExchangeType },
}

const REMOVED_KEYS: &[(&str, &str, Option<&str>)] = &[
    (
        "DATA_LOADER",
        "dataloader_batch_size",
        Some("the wave profile's BATCH_SIZE"),
    ),
    (
        "DATA_LOADER",
        "dataloader_force_binarization",
        Some("DATA_LOADER.dataloader_force_rebuild_cache"),
    ),
    (
        "GENERAL",
        "train_wave_dsl_filename",
        Some("a single wave DSL filename key"),
    ),
    (
        "GENERAL",
        "run_wave_dsl_filename",
        Some("a single wave DSL filename key"),
    ),
];

fn require<'a>(config: &'a GlobalConfig, section: &str, key: &str) -> Result<&'a str, ConfigError> {
    config.get(section, key).ok_or_else(|| ConfigError::MissingKey {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn require_bool(config: &GlobalConfig, section: &str, key: &str) -> Result<bool, ConfigError> {
    let raw = require(config, section, key)?;
    parse_bool_token(raw).ok_or_else(|| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{raw:?} is not a valid boolean"),
    })
}

fn require_uint(config: &GlobalConfig, section: &str, key: &str, min: u64) -> Result<u64, ConfigError> {
    let raw = require(config, section, key)?;
    let value: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{raw:?} is not a valid unsigned integer"),
    })?;
    if value < min {
        return Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("must be >= {min}, got {value}"),
        });
    }
    Ok(value)
}

fn check_removed_keys(config: &GlobalConfig) -> Result<(), ConfigError> {
    for (section, key, replacement) in REMOVED_KEYS {
        if config.get(section, key).is_some() {
            return Err(ConfigError::RemovedKey {
                section: section.to_string(),
                key: key.to_string(),
                replacement: replacement.map(|r| r.to_string()),
            });
        }
    }
    Ok(())
}

fn validate_exchange_credentials(config: &GlobalConfig, section: &str) -> Result<(), ConfigError> {
    for key in ["api_key", "api_secret", "base_url"] {
        require(config, section, key)?;
    }
    Ok(())
}

/// Validates a parsed config against the required-key rules of §6. Returns
/// the declared `exchange_type` on success for mid-run change detection.
pub fn validate(config: &GlobalConfig) -> Result<ExchangeType, ConfigError> {
    check_removed_keys(config)?;

    let exchange_type_raw = require(config, "GENERAL", "exchange_type")?;
    let exchange_type = match exchange_type_raw.to_ascii_uppercase().as_str() {
        "TEST" => ExchangeType::Test,
        "REAL" => ExchangeType::Real,
        _ => {
            return Err(ConfigError::InvalidValue {
                section: "GENERAL".to_string(),
                key: "exchange_type".to_string(),
                reason: format!("must be TEST|REAL, got {exchange_type_raw:?}"),
            })
        }
    };

    require(config, "GENERAL", "board_config_key")?;
    require(config, "GENERAL", "board_binding_key")?;
    require_uint(config, "GENERAL", "iinuji_logs_buffer_capacity", 1)?;

    require_uint(config, "DATA_LOADER", "dataloader_workers", 0)?;
    require_bool(config, "DATA_LOADER", "dataloader_force_rebuild_cache")?;
    require_uint(config, "DATA_LOADER", "dataloader_csv_bootstrap_deltas", 2)?;
    if let Some(raw) = config.get("DATA_LOADER", "dataloader_range_warn_batches") {
        let value: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
            section: "DATA_LOADER".to_string(),
            key: "dataloader_range_warn_batches".to_string(),
            reason: format!("{raw:?} is not a valid unsigned integer"),
        })?;
        if value < 1 {
            return Err(ConfigError::InvalidValue {
                section: "DATA_LOADER".to_string(),
                key: "dataloader_range_warn_batches".to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
    }
    for key in ["price_tolerance", "volume_tolerance"] {
        let raw = require(config, "DATA_LOADER", key)?;
        let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
            section: "DATA_LOADER".to_string(),
            key: key.to_string(),
            reason: format!("{raw:?} is not a valid float"),
        })?;
        if value < 0.0 {
            return Err(ConfigError::InvalidValue {
                section: "DATA_LOADER".to_string(),
                key: key.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }

    let exchange_section = match exchange_type {
        ExchangeType::Test => "TEST_EXCHANGE",
        ExchangeType::Real => "REAL_EXCHANGE",
    };
    validate_exchange_credentials(config, exchange_section)?;

    Ok(exchange_type)
}

/// Enforces the "exchange_type cannot change mid-run" rule (§4.5) given the
/// exchange type recorded at first load and the one just (re-)validated.
pub fn assert_exchange_type_unchanged(
    old: ExchangeType,
    new: ExchangeType,
) -> Result<(), ConfigError> {
    if old != new {
        return Err(ConfigError::ExchangeTypeChanged { old, new });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::parse_ini;
    use test_case::test_case;

    fn minimal_config(exchange_type: &str) -> String {
        format!(
            "[GENERAL]\n\
             exchange_type = {exchange_type}\n\
             board_config_key = board.dsl\n\
             board_binding_key = stable_pretrain\n\
             iinuji_logs_buffer_capacity = 100\n\
             [DATA_LOADER]\n\
             dataloader_workers = 2\n\
             dataloader_force_rebuild_cache = false\n\
             dataloader_csv_bootstrap_deltas = 16\n\
             price_tolerance = 0.01\n\
             volume_tolerance = 0.01\n\
             [TEST_EXCHANGE]\n\
             api_key = k\n\
             api_secret = s\n\
             base_url = https://example.test\n\
             [REAL_EXCHANGE]\n\
             api_key = k\n\
             api_secret = s\n\
             base_url = https://example.com\n"
        )
    }

    #[test]
    fn minimal_config_validates() {
        let config = parse_ini(&minimal_config("TEST"));
        assert_eq!(validate(&config).unwrap(), ExchangeType::Test);
    }

    #[test]
    fn missing_exchange_type_is_rejected() {
        let config = parse_ini("[GENERAL]\nboard_config_key = b\n");
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingKey { .. })
        ));
    }

    #[test_case("DATA_LOADER", "dataloader_batch_size", "32", "BATCH_SIZE"; "batch size")]
    #[test_case(
        "DATA_LOADER",
        "dataloader_force_binarization",
        "true",
        "dataloader_force_rebuild_cache";
        "force binarization"
    )]
    #[test_case("GENERAL", "train_wave_dsl_filename", "train.wave", "wave DSL filename"; "train filename")]
    #[test_case("GENERAL", "run_wave_dsl_filename", "run.wave", "wave DSL filename"; "run filename")]
    fn removed_key_is_rejected_with_migration_message(
        section: &str,
        key: &str,
        value: &str,
        replacement_fragment: &str,
    ) {
        let mut text = minimal_config("TEST");
        text.push_str(&format!("[{section}]\n{key} = {value}\n"));
        let config = parse_ini(&text);
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::RemovedKey { .. }));
        assert!(err.to_string().contains(replacement_fragment));
    }

    #[test]
    fn zero_capacity_ring_buffer_is_rejected() {
        let mut text = minimal_config("TEST");
        text.push_str("[GENERAL]\niinuji_logs_buffer_capacity = 0\n");
        let config = parse_ini(&text);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let mut text = minimal_config("TEST");
        text.push_str("[DATA_LOADER]\nprice_tolerance = -1\n");
        let config = parse_ini(&text);
        assert!(validate(&config).is_err());
    }
}
