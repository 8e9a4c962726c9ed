use std::path::PathBuf;

/// Top-level error kinds shared across the workspace.
///
/// Individual crates (`tsiemene_dsl`, `tsiemene_config`, `tsiemene_core`) define
/// their own narrower `thiserror` enums and fold them into this one via `#[from]`,
/// matching the teacher's per-crate `error.rs` + top-level aggregation pattern.
#[derive(Debug, thiserror::Error)]
pub enum TsiemeneError {
    #[error("invalid dsl at {path}:{line}:{column}: {message}")]
    InvalidDsl {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("manifest mismatch for {path}: {reason}")]
    ManifestMismatch { path: PathBuf, reason: String },

    #[error("immutable lock violation: {0}")]
    ImmutableLockViolation(String),

    #[error("registry corruption: {0}")]
    RegistryCorruption(String),

    #[error("invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("topology error: {0}")]
    TopologyError(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TsiemeneError {
    /// Whether this kind is fatal per the error handling design: the caller
    /// should log a structured message and terminate rather than recover.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TsiemeneError::InvalidDsl { .. }
                | TsiemeneError::ManifestMismatch { .. }
                | TsiemeneError::ImmutableLockViolation(_)
                | TsiemeneError::RegistryCorruption(_)
                | TsiemeneError::ConfigError(_)
        )
    }
}
