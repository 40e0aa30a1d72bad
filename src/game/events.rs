//! Game Events
//!
//! Everything observable that happens inside a match, stamped with the
//! simulation tick. The engine drains these after every command or tick;
//! the runtime logs them and turns the network-relevant ones into wire
//! events.

use serde::{Serialize, Deserialize};
use crate::core::vec2::FixedVec2;
use crate::game::state::{PlayerId, MatchPhase, MatchResult, EndReason};

/// Priority for event ordering within a tick.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Phase changes come first
    Phase = 0,
    /// AI detection
    Detection = 1,
    /// Found / Safe resolutions
    Resolution = 2,
    /// Position changes
    Movement = 3,
    /// Match end is always last
    Terminal = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// The match clock moved the match forward
    PhaseChanged {
        from: MatchPhase,
        to: MatchPhase,
    },

    /// A player moved one step (or the AI seeker advanced)
    PlayerMoved {
        player_id: PlayerId,
        position: FixedVec2,
    },

    /// The AI seeker gained sight of a hider and started pursuing
    HiderSpotted {
        seeker_id: PlayerId,
        hider_id: PlayerId,
    },

    /// A hider was tagged
    HiderFound {
        hider_id: PlayerId,
        seeker_id: Option<PlayerId>,
    },

    /// A hider reached the den
    HiderSafe {
        hider_id: PlayerId,
    },

    /// Match ended
    MatchEnded {
        result: MatchResult,
        reason: EndReason,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Simulation tick when the event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerMoved { player_id, .. } => Some(*player_id),
            GameEventData::HiderSpotted { hider_id, .. } => Some(*hider_id),
            GameEventData::HiderFound { hider_id, .. } => Some(*hider_id),
            GameEventData::HiderSafe { hider_id } => Some(*hider_id),
            _ => None,
        };

        Self {
            tick,
            priority,
            player_id,
            data,
        }
    }

    /// Create phase changed event.
    pub fn phase_changed(tick: u32, from: MatchPhase, to: MatchPhase) -> Self {
        Self::new(tick, EventPriority::Phase, GameEventData::PhaseChanged { from, to })
    }

    /// Create player moved event.
    pub fn player_moved(tick: u32, player_id: PlayerId, position: FixedVec2) -> Self {
        Self::new(
            tick,
            EventPriority::Movement,
            GameEventData::PlayerMoved { player_id, position },
        )
    }

    /// Create hider spotted event.
    pub fn hider_spotted(tick: u32, seeker_id: PlayerId, hider_id: PlayerId) -> Self {
        Self::new(
            tick,
            EventPriority::Detection,
            GameEventData::HiderSpotted { seeker_id, hider_id },
        )
    }

    /// Create hider found event.
    pub fn hider_found(tick: u32, hider_id: PlayerId, seeker_id: Option<PlayerId>) -> Self {
        Self::new(
            tick,
            EventPriority::Resolution,
            GameEventData::HiderFound { hider_id, seeker_id },
        )
    }

    /// Create hider safe event.
    pub fn hider_safe(tick: u32, hider_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Resolution, GameEventData::HiderSafe { hider_id })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, result: MatchResult, reason: EndReason) -> Self {
        Self::new(
            tick,
            EventPriority::Terminal,
            GameEventData::MatchEnded { result, reason },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.player_id == other.player_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.player_id.cmp(&other.player_id))
    }
}
