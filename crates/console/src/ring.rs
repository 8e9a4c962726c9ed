use crate::entry::LogEntry;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded ring buffer (minimum capacity 1). Inserting when full drops the
/// oldest entry. The snapshot API returns up to N most recent entries
/// without mutating the buffer.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    next_seq: Mutex<u64>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            next_seq: Mutex::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Assigns the next monotonically increasing `seq` and pushes `entry`,
    /// dropping the oldest entry if the buffer is at capacity.
    pub fn push(&self, mut entry: LogEntry) {
        let mut seq_guard = self.next_seq.lock().unwrap_or_else(|e| e.into_inner());
        entry.seq = *seq_guard;
        *seq_guard += 1;
        drop(seq_guard);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Returns up to the `n` most recent entries, oldest-first, without
    /// mutating the buffer.
    pub fn snapshot(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogLevel;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            seq: 0,
            timestamp_ms: 0,
            level: LogLevel::Info,
            thread_id: "main".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn drops_oldest_when_full() {
        let buf = RingBuffer::new(8);
        for i in 0..20 {
            buf.push(entry(&format!("m{i}")));
        }
        let snapshot = buf.snapshot(8);
        assert_eq!(snapshot.len(), 8);
        assert_eq!(snapshot.first().unwrap().message, "m12");
        assert_eq!(snapshot.last().unwrap().message, "m19");
    }

    #[test]
    fn seq_is_monotonically_increasing() {
        let buf = RingBuffer::new(8);
        for i in 0..20 {
            buf.push(entry(&format!("m{i}")));
        }
        let snapshot = buf.snapshot(8);
        for pair in snapshot.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
        }
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let buf = RingBuffer::new(4);
        buf.push(entry("a"));
        let first = buf.snapshot(10);
        let second = buf.snapshot(10);
        assert_eq!(first, second);
    }

    #[test]
    fn capacity_is_clamped_to_at_least_one() {
        let buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
    }
}
