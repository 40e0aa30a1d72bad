//! Ordered Event Log
//!
//! One append-only log per match. Every append gets the next sequence
//! number and is fanned out over a tokio broadcast channel. A subscriber
//! reads through a [`LogCursor`], which hands entries over strictly in
//! sequence order and asks for a backfill when it sees a gap or its
//! receiver lagged.
//!
//! ```text
//!   append ──► [1][2][3][4][5] ──broadcast──► cursor(applied=2)
//!                                              recv 3 → apply
//!                                              recv 5 → gap, since(3) → apply 4, 5
//!                                              recv 4 → stale, drop
//! ```

use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tokio::sync::{broadcast, RwLock};

use crate::sync::protocol::WireEvent;

/// A sequenced log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequence number, starting at 1
    pub seq: u64,
    /// Payload
    pub event: WireEvent,
}

/// Shared per-match event log. Clones share the same log.
#[derive(Clone)]
pub struct EventLog {
    // Uncapped: a cursor may backfill from any sequence number. Growth is
    // bounded by the match clock (throttled positions plus one entry per
    // flag), and the entries are freed when the last clone of the match's
    // log is dropped.
    entries: Arc<RwLock<Vec<LogEntry>>>,
    tx: broadcast::Sender<LogEntry>,
}

impl EventLog {
    /// Empty log whose live channel buffers `capacity` entries per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            tx,
        }
    }

    /// Append and broadcast. Returns the assigned sequence number.
    pub async fn append(&self, event: WireEvent) -> u64 {
        let mut entries = self.entries.write().await;
        let seq = entries.len() as u64 + 1;
        let entry = LogEntry { seq, event };
        entries.push(entry.clone());
        // Sent under the write lock so broadcast order matches seq order.
        let _ = self.tx.send(entry);
        seq
    }

    /// All entries with a sequence number greater than `seq`.
    pub async fn since(&self, seq: u64) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        let start = (seq as usize).min(entries.len());
        entries[start..].to_vec()
    }

    /// Highest sequence number appended so far.
    pub async fn head(&self) -> u64 {
        self.entries.read().await.len() as u64
    }

    /// Live feed of new entries.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }
}

/// What the cursor made of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Accept {
    /// Next in sequence; apply it
    Next(LogEntry),
    /// Already applied
    Stale,
    /// Entries are missing before this one; backfill from the log
    Gap,
}

/// Per-subscriber read position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCursor {
    applied: u64,
}

impl LogCursor {
    /// Cursor that has applied nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor that has already applied everything up to `seq`.
    pub fn at(seq: u64) -> Self {
        Self { applied: seq }
    }

    /// Last applied sequence number.
    pub fn position(&self) -> u64 {
        self.applied
    }

    /// Offer a live entry.
    pub fn accept(&mut self, entry: LogEntry) -> Accept {
        if entry.seq <= self.applied {
            Accept::Stale
        } else if entry.seq == self.applied + 1 {
            self.applied = entry.seq;
            Accept::Next(entry)
        } else {
            Accept::Gap
        }
    }

    /// Take every entry that continues the sequence, in order.
    pub fn backfill(&mut self, entries: &[LogEntry]) -> Vec<LogEntry> {
        let mut out = Vec::new();
        for entry in entries {
            if let Accept::Next(e) = self.accept(entry.clone()) {
                out.push(e);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;

    fn event(b: u8) -> WireEvent {
        WireEvent::HiderFound { player_id: PlayerId::new([b; 16]), ts: b as i64 }
    }

    fn entry(seq: u64) -> LogEntry {
        LogEntry { seq, event: event(seq as u8) }
    }

    #[test]
    fn test_cursor_orders_and_dedupes() {
        let mut cursor = LogCursor::new();
        assert_eq!(cursor.accept(entry(1)), Accept::Next(entry(1)));
        assert_eq!(cursor.accept(entry(1)), Accept::Stale);
        assert_eq!(cursor.accept(entry(3)), Accept::Gap);
        assert_eq!(cursor.position(), 1);

        let filled = cursor.backfill(&[entry(2), entry(3), entry(5)]);
        assert_eq!(filled, vec![entry(2), entry(3)]);
        assert_eq!(cursor.position(), 3);
    }

    #[tokio::test]
    async fn test_append_assigns_sequence() {
        let log = EventLog::new(8);
        let mut rx = log.subscribe();
        assert_eq!(log.append(event(1)).await, 1);
        assert_eq!(log.append(event(2)).await, 2);
        assert_eq!(log.head().await, 2);

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
        assert_eq!(log.since(1).await, vec![LogEntry { seq: 2, event: event(2) }]);
        assert!(log.since(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_lagged_receiver_backfills() {
        let log = EventLog::new(2);
        let mut rx = log.subscribe();
        for b in 1..=5 {
            log.append(event(b)).await;
        }

        let mut cursor = LogCursor::new();
        let mut applied = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(entry) => match cursor.accept(entry) {
                    Accept::Next(e) => applied.push(e.seq),
                    Accept::Stale => {}
                    Accept::Gap => {
                        for e in cursor.backfill(&log.since(cursor.position()).await) {
                            applied.push(e.seq);
                        }
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    for e in cursor.backfill(&log.since(cursor.position()).await) {
                        applied.push(e.seq);
                    }
                }
                Err(_) => break,
            }
        }
        assert_eq!(applied, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_late_clone_backfills_whole_match() {
        let log = EventLog::new(1);
        let writer = log.clone();
        for b in 1..=20 {
            writer.append(event(b)).await;
        }
        drop(writer);

        // Nothing is evicted, so a cursor joining late still sees the first entry.
        let mut cursor = LogCursor::new();
        let filled = cursor.backfill(&log.since(0).await);
        assert_eq!(filled.len(), 20);
        assert_eq!(filled[0], entry(1));
        assert_eq!(cursor.position(), 20);
    }
}
