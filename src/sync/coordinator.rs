//! Sync Coordinator
//!
//! Merges the three unordered sources of remote state into field-level
//! changes for the engine:
//!
//! ```text
//!   broadcast / log entry ─┐
//!   store row notification ├─► merge into cache ─► Vec<FieldChange> (only real diffs)
//!   periodic full poll    ─┘
//! ```
//!
//! Flags are OR-merged and never revert. Positions are last-write-wins in
//! local receipt order. The local player's own position always comes from
//! the local engine, so echoes of it are dropped.
//!
//! A player whose row is deleted, or whose previously persisted row is
//! missing from a full poll, has left. Their id is queued for
//! [`SyncCoordinator::take_departures`] and tombstoned, so late broadcasts
//! about them are dropped.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec2::FixedVec2;
use crate::game::engine::FieldChange;
use crate::game::state::PlayerId;
use crate::sync::log::LogEntry;
use crate::sync::protocol::{PersistedRow, WireEvent};

/// One inbound item from any source.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Ephemeral broadcast message
    Broadcast(WireEvent),
    /// Store change notification (new row contents)
    RowChange(PersistedRow),
    /// Store deleted a player's row
    RowRemoved(PlayerId),
    /// Full-list poll result
    Poll(Vec<PersistedRow>),
    /// Entry delivered in order by a log cursor
    Logged(LogEntry),
}

/// Last known remote state of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachedPlayer {
    /// Found flag
    pub found: bool,
    /// Den flag
    pub reached_den: bool,
    /// Last position seen
    pub position: Option<FixedVec2>,
    /// A row for this player has been seen in the store
    pub persisted: bool,
}

/// Canonical per-player cache for one client.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    local_id: PlayerId,
    cache: BTreeMap<PlayerId, CachedPlayer>,
    departed: BTreeSet<PlayerId>,
    departures: Vec<PlayerId>,
}

impl SyncCoordinator {
    /// Coordinator for the client acting as `local_id`.
    pub fn new(local_id: PlayerId) -> Self {
        Self {
            local_id,
            cache: BTreeMap::new(),
            departed: BTreeSet::new(),
            departures: Vec::new(),
        }
    }

    /// Merge one inbound item. Returns only the fields that changed.
    pub fn ingest(&mut self, inbound: Inbound) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        match inbound {
            Inbound::Broadcast(event) | Inbound::Logged(LogEntry { event, .. }) => {
                self.merge_change(event.to_change(), &mut changes);
            }
            Inbound::RowChange(row) => self.merge_row(&row, &mut changes),
            Inbound::RowRemoved(player) => self.depart(player),
            Inbound::Poll(rows) => {
                for row in &rows {
                    self.merge_row(row, &mut changes);
                }
                let listed: BTreeSet<PlayerId> = rows.iter().map(|r| r.player_id).collect();
                let missing: Vec<PlayerId> = self
                    .cache
                    .iter()
                    .filter(|(id, entry)| entry.persisted && !listed.contains(*id))
                    .map(|(id, _)| *id)
                    .collect();
                for player in missing {
                    self.depart(player);
                }
                if !changes.is_empty() {
                    debug!("Poll reconciled {} field(s)", changes.len());
                }
            }
        }
        changes
    }

    /// Record a change the local engine authored, so its echo is a no-op.
    pub fn note_local(&mut self, change: &FieldChange) {
        let entry = self.cache.entry(change.player()).or_default();
        match *change {
            FieldChange::Position { position, .. } => entry.position = Some(position),
            FieldChange::Found { .. } => entry.found = true,
            FieldChange::ReachedDen { .. } => entry.reached_den = true,
        }
    }

    /// Cached view of a player.
    pub fn cached(&self, id: &PlayerId) -> Option<&CachedPlayer> {
        self.cache.get(id)
    }

    /// Drop a departed player.
    pub fn forget(&mut self, id: &PlayerId) {
        self.cache.remove(id);
    }

    /// Players seen leaving since the last call, in detection order.
    pub fn take_departures(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.departures)
    }

    /// Whether `id` is known to have left.
    pub fn has_departed(&self, id: &PlayerId) -> bool {
        self.departed.contains(id)
    }

    fn depart(&mut self, player: PlayerId) {
        // The local player's exit is driven by its own runtime.
        if player == self.local_id || !self.departed.insert(player) {
            return;
        }
        debug!("Player {} left", player.short());
        self.cache.remove(&player);
        self.departures.push(player);
    }

    /// Digest over (id, found, den) for every cached player. Two clients
    /// that converged produce the same digest.
    pub fn digest(&self) -> StateHash {
        let mut hasher = StateHasher::new(b"HIDEOUT_SYNC_V1");
        for (id, entry) in &self.cache {
            hasher.update_id(id.as_bytes());
            hasher.update_bool(entry.found);
            hasher.update_bool(entry.reached_den);
        }
        hasher.finalize()
    }

    fn merge_row(&mut self, row: &PersistedRow, out: &mut Vec<FieldChange>) {
        let player = row.player_id;
        if self.departed.contains(&player) {
            trace!("Dropping row for departed {}", player.short());
            return;
        }
        self.cache.entry(player).or_default().persisted = true;
        if row.is_found {
            self.merge_change(FieldChange::Found { player }, out);
        }
        if row.has_reached_den {
            self.merge_change(FieldChange::ReachedDen { player }, out);
        }
        self.merge_change(FieldChange::Position { player, position: row.position_vec() }, out);
    }

    fn merge_change(&mut self, change: FieldChange, out: &mut Vec<FieldChange>) {
        let player = change.player();
        if self.departed.contains(&player) {
            trace!("Dropping change for departed {}", player.short());
            return;
        }
        if let FieldChange::Position { .. } = change {
            if player == self.local_id {
                trace!("Dropping own position echo");
                return;
            }
        }

        let entry = self.cache.entry(player).or_default();
        let changed = match change {
            FieldChange::Position { position, .. } => {
                let changed = entry.position != Some(position);
                entry.position = Some(position);
                changed
            }
            FieldChange::Found { .. } => !std::mem::replace(&mut entry.found, true),
            FieldChange::ReachedDen { .. } => !std::mem::replace(&mut entry.reached_den, true),
        };
        if changed {
            out.push(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> PlayerId {
        PlayerId::new([b; 16])
    }

    fn row(b: u8, found: bool, den: bool, x: f64) -> PersistedRow {
        let mut r = PersistedRow::new(id(b), FixedVec2::from_floats(x, 0.0));
        r.is_found = found;
        r.has_reached_den = den;
        r
    }

    #[test]
    fn test_flags_or_merge() {
        let mut sync = SyncCoordinator::new(id(9));
        let first = sync.ingest(Inbound::Broadcast(WireEvent::found(id(1))));
        assert_eq!(first, vec![FieldChange::Found { player: id(1) }]);

        // A stale poll row with is_found=false never reverts the flag.
        let poll = sync.ingest(Inbound::Poll(vec![row(1, false, false, 20.0)]));
        assert_eq!(poll, vec![FieldChange::Position { player: id(1), position: FixedVec2::from_ints(20, 0) }]);
        assert!(sync.cached(&id(1)).unwrap().found);
    }

    #[test]
    fn test_duplicate_found_is_silent() {
        let mut sync = SyncCoordinator::new(id(9));
        sync.ingest(Inbound::RowChange(row(1, true, false, 0.0)));
        let again = sync.ingest(Inbound::Poll(vec![row(1, true, false, 0.0)]));
        assert!(again.is_empty());
        let broadcast = sync.ingest(Inbound::Broadcast(WireEvent::found(id(1))));
        assert!(broadcast.is_empty());
    }

    #[test]
    fn test_own_position_echo_ignored() {
        let mut sync = SyncCoordinator::new(id(9));
        let echo = sync.ingest(Inbound::Broadcast(WireEvent::position(id(9), FixedVec2::from_ints(40, 40))));
        assert!(echo.is_empty());

        // Flags about the local player still apply.
        let tagged = sync.ingest(Inbound::Broadcast(WireEvent::found(id(9))));
        assert_eq!(tagged, vec![FieldChange::Found { player: id(9) }]);
    }

    #[test]
    fn test_position_last_write_wins() {
        let mut sync = SyncCoordinator::new(id(9));
        sync.ingest(Inbound::Broadcast(WireEvent::position(id(1), FixedVec2::from_ints(40, 0))));
        let changes = sync.ingest(Inbound::RowChange(row(1, false, false, 20.0)));
        assert_eq!(changes, vec![FieldChange::Position { player: id(1), position: FixedVec2::from_ints(20, 0) }]);
        assert_eq!(sync.cached(&id(1)).unwrap().position, Some(FixedVec2::from_ints(20, 0)));
    }

    #[test]
    fn test_note_local_suppresses_echo() {
        let mut sync = SyncCoordinator::new(id(9));
        sync.note_local(&FieldChange::Found { player: id(1) });
        assert!(sync.ingest(Inbound::Broadcast(WireEvent::found(id(1)))).is_empty());
    }

    #[test]
    fn test_digest_converges_regardless_of_order() {
        let mut a = SyncCoordinator::new(id(8));
        let mut b = SyncCoordinator::new(id(9));

        a.ingest(Inbound::Broadcast(WireEvent::found(id(1))));
        a.ingest(Inbound::Broadcast(WireEvent::reached_den(id(2))));

        b.ingest(Inbound::Poll(vec![row(2, false, true, 0.0)]));
        b.ingest(Inbound::RowChange(row(1, true, false, 0.0)));

        assert_eq!(a.digest(), b.digest());
        b.ingest(Inbound::Broadcast(WireEvent::found(id(3))));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_poll_drops_missing_rows() {
        let mut sync = SyncCoordinator::new(id(9));
        let everyone = vec![row(1, false, false, 0.0), row(2, false, false, 0.0), row(9, false, false, 0.0)];
        sync.ingest(Inbound::Poll(everyone));
        // Known only from a broadcast: no row yet, so not a departure.
        sync.ingest(Inbound::Broadcast(WireEvent::position(id(3), FixedVec2::from_ints(20, 0))));

        sync.ingest(Inbound::Poll(vec![row(1, false, false, 0.0)]));
        assert_eq!(sync.take_departures(), vec![id(2)]);
        assert!(sync.take_departures().is_empty());
        assert!(sync.cached(&id(2)).is_none());
        assert!(sync.cached(&id(3)).is_some());
        assert!(!sync.has_departed(&id(9)));
    }

    #[test]
    fn test_removed_row_is_tombstoned() {
        let mut sync = SyncCoordinator::new(id(9));
        sync.ingest(Inbound::RowChange(row(1, false, false, 0.0)));
        let before = sync.digest();

        assert!(sync.ingest(Inbound::RowRemoved(id(1))).is_empty());
        assert_eq!(sync.take_departures(), vec![id(1)]);
        assert_ne!(sync.digest(), before);

        // Late traffic about the departed player changes nothing.
        assert!(sync.ingest(Inbound::Broadcast(WireEvent::found(id(1)))).is_empty());
        assert!(sync.ingest(Inbound::RowChange(row(1, true, false, 0.0))).is_empty());
        sync.ingest(Inbound::RowRemoved(id(1)));
        assert!(sync.take_departures().is_empty());
        assert!(sync.cached(&id(1)).is_none());
    }
}
