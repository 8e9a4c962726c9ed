use std::time::{SystemTime, UNIX_EPOCH};

/// `{seq, timestamp, level, thread_id, message}` (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp_ms: u128,
    pub level: LogLevel,
    pub thread_id: String,
    pub message: String,
}

/// `DEBUG, INFO, WARNING, ERROR, FATAL, DEV_WARNING, TERMINATION, SYS_ERRNO`.
///
/// The first four map directly onto `tracing::Level`; the last four are
/// this crate's extension, selected via the `tsi_level` event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    DevWarning,
    Termination,
    SysErrno,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::DevWarning => "DEV_WARNING",
            LogLevel::Termination => "TERMINATION",
            LogLevel::SysErrno => "SYS_ERRNO",
        }
    }

    pub fn from_tsi_field(name: &str) -> Option<LogLevel> {
        match name {
            "FATAL" => Some(LogLevel::Fatal),
            "DEV_WARNING" => Some(LogLevel::DevWarning),
            "TERMINATION" => Some(LogLevel::Termination),
            "SYS_ERRNO" => Some(LogLevel::SysErrno),
            _ => None,
        }
    }

    pub fn from_tracing_level(level: &tracing::Level) -> LogLevel {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

pub(crate) fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
