//! Wire Protocol
//!
//! Broadcast events and persisted rows exchanged between multiplayer
//! clients. JSON is the primary encoding (it is what the relay forwards);
//! bincode is available for compact transport.
//!
//! ```text
//!   {"type":"position_update","playerId":"…","x":140.0,"y":60.0,"ts":1718000000000}
//!   {"type":"hider_found","playerId":"…","ts":1718000000000}
//!   {"type":"hider_reached_den","playerId":"…","ts":1718000000000}
//! ```

use serde::{Serialize, Deserialize};

use crate::core::vec2::FixedVec2;
use crate::game::engine::FieldChange;
use crate::game::state::{Player, PlayerId, PlayerStatus};

/// Broadcast channel name for a match.
pub fn channel_for(match_id: &str) -> String {
    format!("game_{}", match_id)
}

/// Current UTC time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// BROADCAST EVENTS
// =============================================================================

/// Ephemeral broadcast message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// A player moved.
    PositionUpdate {
        /// Mover
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        /// World X of the cell corner
        x: f64,
        /// World Y of the cell corner
        y: f64,
        /// Sender clock, epoch millis
        #[serde(alias = "timestamp")]
        ts: i64,
    },

    /// A hider was tagged.
    HiderFound {
        /// Hider
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        /// Sender clock, epoch millis
        #[serde(alias = "timestamp")]
        ts: i64,
    },

    /// A hider reached the den.
    HiderReachedDen {
        /// Hider
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        /// Sender clock, epoch millis
        #[serde(alias = "timestamp")]
        ts: i64,
    },
}

/// Externally tagged mirror of [`WireEvent`]; bincode cannot encode
/// internally tagged enums.
#[derive(Serialize, Deserialize)]
enum CompactEvent {
    Position(PlayerId, f64, f64, i64),
    Found(PlayerId, i64),
    ReachedDen(PlayerId, i64),
}

impl WireEvent {
    /// Position update stamped now.
    pub fn position(player_id: PlayerId, position: FixedVec2) -> Self {
        let (x, y) = position.to_floats();
        WireEvent::PositionUpdate { player_id, x, y, ts: now_millis() }
    }

    /// Found notice stamped now.
    pub fn found(player_id: PlayerId) -> Self {
        WireEvent::HiderFound { player_id, ts: now_millis() }
    }

    /// Den notice stamped now.
    pub fn reached_den(player_id: PlayerId) -> Self {
        WireEvent::HiderReachedDen { player_id, ts: now_millis() }
    }

    /// Stamp a local change for broadcast.
    pub fn from_change(change: &FieldChange) -> Self {
        match *change {
            FieldChange::Position { player, position } => Self::position(player, position),
            FieldChange::Found { player } => Self::found(player),
            FieldChange::ReachedDen { player } => Self::reached_den(player),
        }
    }

    /// Subject of the event.
    pub fn player_id(&self) -> PlayerId {
        match self {
            WireEvent::PositionUpdate { player_id, .. }
            | WireEvent::HiderFound { player_id, .. }
            | WireEvent::HiderReachedDen { player_id, .. } => *player_id,
        }
    }

    /// Sender timestamp.
    pub fn ts(&self) -> i64 {
        match self {
            WireEvent::PositionUpdate { ts, .. }
            | WireEvent::HiderFound { ts, .. }
            | WireEvent::HiderReachedDen { ts, .. } => *ts,
        }
    }

    /// Field-level change carried by the event.
    pub fn to_change(&self) -> FieldChange {
        match *self {
            WireEvent::PositionUpdate { player_id, x, y, .. } => FieldChange::Position {
                player: player_id,
                position: FixedVec2::from_floats(x, y),
            },
            WireEvent::HiderFound { player_id, .. } => FieldChange::Found { player: player_id },
            WireEvent::HiderReachedDen { player_id, .. } => FieldChange::ReachedDen { player: player_id },
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let compact = match *self {
            WireEvent::PositionUpdate { player_id, x, y, ts } => CompactEvent::Position(player_id, x, y, ts),
            WireEvent::HiderFound { player_id, ts } => CompactEvent::Found(player_id, ts),
            WireEvent::HiderReachedDen { player_id, ts } => CompactEvent::ReachedDen(player_id, ts),
        };
        bincode::serialize(&compact)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        Ok(match bincode::deserialize(data)? {
            CompactEvent::Position(player_id, x, y, ts) => WireEvent::PositionUpdate { player_id, x, y, ts },
            CompactEvent::Found(player_id, ts) => WireEvent::HiderFound { player_id, ts },
            CompactEvent::ReachedDen(player_id, ts) => WireEvent::HiderReachedDen { player_id, ts },
        })
    }
}

// =============================================================================
// PERSISTED ROWS
// =============================================================================

/// Stored position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RowPosition {
    /// World X
    pub x: f64,
    /// World Y
    pub y: f64,
}

/// One player's row in the persisted player-state table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRow {
    /// Player
    pub player_id: PlayerId,
    /// Tagged by a seeker
    #[serde(default)]
    pub is_found: bool,
    /// Reached the den
    #[serde(default)]
    pub has_reached_den: bool,
    /// Last stored position
    #[serde(default)]
    pub position: RowPosition,
}

impl PersistedRow {
    /// Fresh row for a joining player.
    pub fn new(player_id: PlayerId, position: FixedVec2) -> Self {
        let (x, y) = position.to_floats();
        Self {
            player_id,
            is_found: false,
            has_reached_den: false,
            position: RowPosition { x, y },
        }
    }

    /// Row mirroring a player's current state.
    pub fn from_player(player: &Player) -> Self {
        let mut row = Self::new(player.id, player.position);
        row.is_found = player.status == PlayerStatus::Found;
        row.has_reached_den = player.reached_den;
        row
    }

    /// Position in fixed point.
    pub fn position_vec(&self) -> FixedVec2 {
        FixedVec2::from_floats(self.position.x, self.position.y)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Controller, Role};

    const UUID: &str = "6f1c2a52-1d3e-4c1f-9a55-0b8f0f0e7a11";

    fn pid() -> PlayerId {
        PlayerId::from_uuid_str(UUID).unwrap()
    }

    #[test]
    fn test_wire_event_json_shape() {
        let event = WireEvent::PositionUpdate { player_id: pid(), x: 140.0, y: 60.0, ts: 5 };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "position_update");
        assert_eq!(json["playerId"], UUID);
        assert_eq!(json["x"], 140.0);
        assert_eq!(json["ts"], 5);
    }

    #[test]
    fn test_accepts_timestamp_alias() {
        let raw = format!(r#"{{"type":"hider_found","playerId":"{}","timestamp":42}}"#, UUID);
        let event = WireEvent::from_json(&raw).unwrap();
        assert_eq!(event, WireEvent::HiderFound { player_id: pid(), ts: 42 });
        assert_eq!(event.to_change(), FieldChange::Found { player: pid() });
    }

    #[test]
    fn test_rejects_unknown_type() {
        let raw = format!(r#"{{"type":"teleport","playerId":"{}","ts":1}}"#, UUID);
        assert!(WireEvent::from_json(&raw).is_err());
    }

    #[test]
    fn test_binary_wire_event() {
        let event = WireEvent::HiderReachedDen { player_id: pid(), ts: 9 };
        let bytes = event.to_bytes().unwrap();
        assert_eq!(WireEvent::from_bytes(&bytes).unwrap(), event);
    }

    #[test]
    fn test_change_to_event_keeps_position() {
        let change = FieldChange::Position { player: pid(), position: FixedVec2::from_ints(140, 60) };
        let event = WireEvent::from_change(&change);
        assert!(event.ts() > 0);
        assert_eq!(event.to_change(), change);
    }

    #[test]
    fn test_row_from_player() {
        let mut player = Player::new(pid(), Role::Hider, Controller::Human, FixedVec2::from_ints(20, 40));
        player.reached_den = true;
        let row = PersistedRow::from_player(&player);
        assert!(row.has_reached_den);
        assert!(!row.is_found);
        assert_eq!(row.position, RowPosition { x: 20.0, y: 40.0 });

        let parsed = PersistedRow::from_json(&format!(r#"{{"player_id":"{}","is_found":true}}"#, UUID)).unwrap();
        assert!(parsed.is_found);
        assert_eq!(parsed.position_vec(), FixedVec2::ZERO);
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(channel_for("abc"), "game_abc");
    }
}
