use crate::entry::{now_ms, LogEntry, LogLevel};
use crate::ring::RingBuffer;
use std::sync::Arc;

/// The well-known event field name this crate's custom levels are carried
/// under: `tracing::error!(tsi_level = "FATAL", "...")`.
pub const TSI_LEVEL_FIELD: &str = "tsi_level";

/// Returns the `tracing` field-name constant used to tag an event with one
/// of this crate's extended levels (`FATAL`, `DEV_WARNING`, `TERMINATION`,
/// `SYS_ERRNO`).
pub fn tsi_level_field() -> &'static str {
    TSI_LEVEL_FIELD
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    tsi_level: Option<String>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if field.name() == TSI_LEVEL_FIELD {
            self.tsi_level = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if field.name() == TSI_LEVEL_FIELD {
            self.tsi_level = Some(value.to_string());
        }
    }
}

/// A [`tracing_subscriber::Layer`] that captures every event into a shared,
/// bounded [`RingBuffer`] — ANSI-stripped, level- and thread-tagged — while
/// letting normal `tracing_subscriber::fmt` layers keep formatting to the
/// terminal unmodified.
pub struct RingBufferLayer {
    buffer: Arc<RingBuffer>,
}

impl RingBufferLayer {
    pub fn new(buffer: Arc<RingBuffer>) -> Self {
        RingBufferLayer { buffer }
    }

    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for RingBufferLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let level = visitor
            .tsi_level
            .as_deref()
            .and_then(LogLevel::from_tsi_field)
            .unwrap_or_else(|| LogLevel::from_tracing_level(event.metadata().level()));

        let message = tsiemene_common::ansi::strip_ansi_escapes(&visitor.message);
        let thread_id = format!("{:?}", std::thread::current().id());

        self.buffer.push(LogEntry {
            seq: 0, // assigned by RingBuffer::push
            timestamp_ms: now_ms(),
            level,
            thread_id,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn captures_plain_events_at_their_tracing_level() {
        let buffer = Arc::new(RingBuffer::new(16));
        let layer = RingBufferLayer::new(Arc::clone(&buffer));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hello {}", "world");
            tracing::warn!("careful");
        });
        let snapshot = buffer.snapshot(16);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].level, LogLevel::Info);
        assert_eq!(snapshot[0].message, "hello world");
        assert_eq!(snapshot[1].level, LogLevel::Warning);
    }

    #[test]
    fn captures_custom_tsi_levels() {
        let buffer = Arc::new(RingBuffer::new(16));
        let layer = RingBufferLayer::new(Arc::clone(&buffer));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(tsi_level = "FATAL", "board locked twice");
        });
        let snapshot = buffer.snapshot(16);
        assert_eq!(snapshot[0].level, LogLevel::Fatal);
        assert_eq!(snapshot[0].message, "board locked twice");
    }

    #[test]
    fn strips_ansi_from_captured_messages() {
        let buffer = Arc::new(RingBuffer::new(16));
        let layer = RingBufferLayer::new(Arc::clone(&buffer));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("\x1b[31mred\x1b[0m text");
        });
        let snapshot = buffer.snapshot(16);
        assert_eq!(snapshot[0].message, "red text");
    }
}
