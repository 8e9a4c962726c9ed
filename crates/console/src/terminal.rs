use std::sync::atomic::{AtomicBool, Ordering};

/// Whether emission to terminal streams is currently enabled. Default on;
/// muting it does not lose anything from the ring buffer (§4.9, §7).
static TERMINAL_ENABLED: AtomicBool = AtomicBool::new(true);

pub fn terminal_enabled() -> bool {
    TERMINAL_ENABLED.load(Ordering::Relaxed)
}

pub fn set_terminal_enabled(on: bool) {
    TERMINAL_ENABLED.store(on, Ordering::Relaxed);
}

/// A `tracing_subscriber` filter function (for `filter::filter_fn`) that
/// gates a terminal-facing `fmt` layer on [`terminal_enabled`], independent
/// of the ring buffer capture (which always runs).
pub fn terminal_filter(_metadata: &tracing::Metadata<'_>) -> bool {
    terminal_enabled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_enabled() {
        assert!(terminal_enabled());
    }

    #[test]
    fn toggle_round_trips() {
        set_terminal_enabled(false);
        assert!(!terminal_enabled());
        set_terminal_enabled(true);
        assert!(terminal_enabled());
    }
}
