//! Observability (§4.9): structured log entries, a bounded ring buffer with
//! a snapshot API, and a [`tracing_subscriber::Layer`] that captures every
//! `tracing` event emitted anywhere in the workspace into that buffer.
//!
//! `SYS_ERRNO`, `DEV_WARNING`, `FATAL`, and `TERMINATION` are this crate's
//! own level values layered on top of `tracing::Level` (since `tracing`
//! itself only has five variants) — carried as an event field, not as
//! additional `tracing` levels, so the rest of the ecosystem's tooling
//! keeps working unmodified.

mod entry;
mod layer;
mod ring;
mod terminal;

pub use entry::{LogEntry, LogLevel};
pub use layer::{tsi_level_field, RingBufferLayer};
pub use ring::RingBuffer;
pub use terminal::{set_terminal_enabled, terminal_enabled, terminal_filter};
