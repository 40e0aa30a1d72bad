//! Persisted Player-State Store
//!
//! The seam between a match runtime and whatever table holds one row per
//! player. Writes are field-level upserts: flags only ever go from false to
//! true, positions overwrite. Every successful write publishes a
//! [`RowNotice`] to subscribers (the new row contents, or the id of a
//! deleted row), which is the change-notification channel the coordinator
//! merges.
//!
//! [`MemoryStore`] is the in-process implementation used by the demo
//! binary and the tests. Failed writes are parked in [`PendingWrites`] and
//! retried by the runtime.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::game::engine::FieldChange;
use crate::game::state::PlayerId;
use crate::sync::protocol::{PersistedRow, RowPosition};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the write
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Row not present
    #[error("no row for player {0}")]
    MissingRow(PlayerId),
}

/// Change notification published after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub enum RowNotice {
    /// Row inserted or updated; carries the new contents
    Upsert(PersistedRow),
    /// Row deleted because the player left
    Removed(PlayerId),
}

/// Persisted player-state table.
pub trait PlayerStore: Send + Sync {
    /// Insert or replace a whole row.
    fn insert_row(&self, row: PersistedRow) -> Result<(), StoreError>;

    /// Apply one field-level change. Flags are OR-merged.
    fn write_change(&self, change: &FieldChange) -> Result<(), StoreError>;

    /// Delete a player's row.
    fn remove_row(&self, player: &PlayerId) -> Result<(), StoreError>;

    /// Every row, in player id order.
    fn fetch_all(&self) -> Result<Vec<PersistedRow>, StoreError>;

    /// One notice per successful write or delete.
    fn subscribe(&self) -> broadcast::Receiver<RowNotice>;
}

/// In-memory store with failure injection.
pub struct MemoryStore {
    rows: Mutex<BTreeMap<PlayerId, PersistedRow>>,
    tx: broadcast::Sender<RowNotice>,
    failures: AtomicU32,
}

impl MemoryStore {
    /// Empty store; `capacity` bounds each subscriber's notification buffer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            rows: Mutex::new(BTreeMap::new()),
            tx,
            failures: AtomicU32::new(0),
        }
    }

    /// Make the next `n` writes fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Current contents of one row.
    pub fn row(&self, player: &PlayerId) -> Option<PersistedRow> {
        self.rows.lock().ok()?.get(player).cloned()
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        let taken = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match taken {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<PlayerId, PersistedRow>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".to_string()))?;
        f(&mut rows)
    }

    fn notify(&self, notice: RowNotice) {
        // No subscribers is fine.
        let _ = self.tx.send(notice);
    }
}

impl PlayerStore for MemoryStore {
    fn insert_row(&self, row: PersistedRow) -> Result<(), StoreError> {
        self.injected_failure()?;
        self.with_rows(|rows| {
            rows.insert(row.player_id, row.clone());
            Ok(())
        })?;
        self.notify(RowNotice::Upsert(row));
        Ok(())
    }

    fn write_change(&self, change: &FieldChange) -> Result<(), StoreError> {
        self.injected_failure()?;
        let row = self.with_rows(|rows| {
            let player = change.player();
            let row = rows
                .entry(player)
                .or_insert_with(|| PersistedRow::new(player, Default::default()));
            match *change {
                FieldChange::Position { position, .. } => {
                    let (x, y) = position.to_floats();
                    row.position = RowPosition { x, y };
                }
                FieldChange::Found { .. } => row.is_found = true,
                FieldChange::ReachedDen { .. } => row.has_reached_den = true,
            }
            Ok(row.clone())
        })?;
        self.notify(RowNotice::Upsert(row));
        Ok(())
    }

    fn remove_row(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.injected_failure()?;
        self.with_rows(|rows| {
            rows.remove(player)
                .map(|_| ())
                .ok_or(StoreError::MissingRow(*player))
        })?;
        debug!("Row for {} removed", player.short());
        self.notify(RowNotice::Removed(*player));
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<PersistedRow>, StoreError> {
        self.with_rows(|rows| Ok(rows.values().cloned().collect()))
    }

    fn subscribe(&self) -> broadcast::Receiver<RowNotice> {
        self.tx.subscribe()
    }
}

/// Writes that failed and wait for a retry. Queued positions for the same
/// player collapse to the latest one; flag writes are kept once each.
#[derive(Debug, Default)]
pub struct PendingWrites {
    queue: VecDeque<FieldChange>,
}

impl PendingWrites {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a failed write.
    pub fn push(&mut self, change: FieldChange) {
        match change {
            FieldChange::Position { player, .. } => {
                let queued = self.queue.iter_mut().find(
                    |c| matches!(c, FieldChange::Position { player: p, .. } if *p == player),
                );
                match queued {
                    Some(slot) => *slot = change,
                    None => self.queue.push_back(change),
                }
            }
            _ => {
                if !self.queue.contains(&change) {
                    self.queue.push_back(change);
                }
            }
        }
    }

    /// Try every parked write once. Returns how many went through.
    pub fn retry(&mut self, store: &dyn PlayerStore) -> usize {
        let mut flushed = 0;
        for _ in 0..self.queue.len() {
            let Some(change) = self.queue.pop_front() else { break };
            match store.write_change(&change) {
                Ok(()) => flushed += 1,
                Err(e) => {
                    debug!("Retry of {:?} failed: {}", change, e);
                    self.queue.push_back(change);
                }
            }
        }
        if flushed > 0 {
            debug!("Flushed {} pending write(s), {} left", flushed, self.queue.len());
        } else if !self.queue.is_empty() {
            warn!("{} write(s) still pending", self.queue.len());
        }
        flushed
    }

    /// Number of parked writes.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Nothing parked.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
