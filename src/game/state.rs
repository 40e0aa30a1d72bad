//! Game State Definitions
//!
//! Players, roles, statuses and the per-match container. Players live in a
//! BTreeMap so every scan (AI target, tag checks, digests) visits them in
//! the same order on every client.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher};
use crate::game::clock::MatchClock;
use crate::game::events::GameEvent;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Serializes as a hyphenated UUID string so wire events and persisted rows
/// carry the same id the store uses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Id reserved for the engine-driven seeker in single-seeker matches.
    pub const AI_SEEKER: PlayerId = PlayerId([
        0x5e, 0xe4, 0x0a, 0x10, 0x00, 0x00, 0x40, 0x00,
        0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    ]);

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id (UUID v4).
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_uuid_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlayerId::from_uuid_str(&value).ok_or_else(|| format!("invalid player id '{}'", value))
    }
}

// =============================================================================
// ROLE / STATUS
// =============================================================================

/// Which side a player is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    /// Must reach the den untagged
    Hider = 0,
    /// Must tag hiders (or beat them home)
    Seeker = 1,
}

/// Who drives a player's movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// Moves only through `submit_move`
    Human,
    /// Moved by the engine's seeker AI
    Ai,
}

/// Player status. Active is the only non-terminal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PlayerStatus {
    /// Still in play
    #[default]
    Active = 0,
    /// Tagged by a seeker
    Found = 1,
    /// Reached the den
    Safe = 2,
}

impl PlayerStatus {
    /// Found or Safe.
    #[inline]
    pub fn is_resolved(self) -> bool {
        self != PlayerStatus::Active
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// State of a single player in the match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,

    /// Hider or seeker
    pub role: Role,

    /// Human or engine-driven
    pub controller: Controller,

    /// Top-left corner of the player's cell box
    pub position: FixedVec2,

    /// Monotonic status
    pub status: PlayerStatus,

    /// Set together with the Safe status; never cleared
    pub reached_den: bool,

    /// Accumulated score
    pub score: u32,

    /// Hiders this player tagged
    pub tags: u32,
}

impl Player {
    /// Create a new active player.
    pub fn new(id: PlayerId, role: Role, controller: Controller, position: FixedVec2) -> Self {
        Self {
            id,
            role,
            controller,
            position,
            status: PlayerStatus::Active,
            reached_den: false,
            score: 0,
            tags: 0,
        }
    }

    /// Still in play.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }

    /// Active hider.
    #[inline]
    pub fn is_active_hider(&self) -> bool {
        self.role == Role::Hider && self.is_active()
    }

    /// Feed the terminal-relevant fields into a digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(&self.id.0);
        hasher.update_u8(self.role as u8);
        hasher.update_u8(self.status as u8);
        hasher.update_bool(self.reached_den);
    }
}

// =============================================================================
// MATCH PHASE / RESULT
// =============================================================================

/// Current phase of the match. Ordered: phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Hiders scatter, seekers wait at the den
    #[default]
    Hiding,
    /// Seekers hunt
    Seeking,
    /// Result is final
    Ended,
}

/// Match result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    /// Not decided yet
    #[default]
    None,
    /// Hiders won
    HiderWin,
    /// Seekers won
    SeekerWin,
}

/// Why the match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A hider reached the den (single-seeker)
    DenReached,
    /// The AI seeker got back to the den first
    SeekerReturned,
    /// Every hider is Found or Safe (multiplayer)
    AllHidersResolved,
    /// The seeking countdown ran out
    TimerExpired,
}

/// Single AI seeker against one human hider, or all-human multiplayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// One human hider, one engine-driven seeker
    SingleSeeker,
    /// N human players synchronized over the network
    Multiplayer,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match identifier (also names the broadcast channel)
    pub match_id: String,

    /// Single-seeker or multiplayer
    pub mode: MatchMode,

    /// Simulation ticks elapsed
    pub tick: u32,

    /// Phase countdown
    pub clock: MatchClock,

    /// Final result (None until ended)
    pub result: MatchResult,

    /// Why the match ended
    pub end_reason: Option<EndReason>,

    /// Spawn RNG
    #[serde(skip)]
    pub rng: DeterministicRng,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,

    /// Events not yet drained
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match in the hiding phase.
    pub fn new(match_id: impl Into<String>, mode: MatchMode, clock: MatchClock, rng_seed: u64) -> Self {
        Self {
            match_id: match_id.into(),
            mode,
            tick: 0,
            clock,
            result: MatchResult::None,
            end_reason: None,
            rng: DeterministicRng::new(rng_seed),
            players: BTreeMap::new(),
            pending_events: Vec::new(),
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> MatchPhase {
        self.clock.phase()
    }

    /// Check if match has ended.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.phase() == MatchPhase::Ended
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// All hiders in id order.
    pub fn hiders(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.role == Role::Hider)
    }

    /// All seekers in id order.
    pub fn seekers(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.role == Role::Seeker)
    }

    /// Mark a hider Found. Returns false (and changes nothing) unless the
    /// hider exists, is still Active, and the match is still running.
    pub fn mark_found(&mut self, hider_id: &PlayerId, seeker_id: Option<PlayerId>) -> bool {
        if self.is_ended() {
            return false;
        }
        let tagged = match self.players.get_mut(hider_id) {
            Some(hider) if hider.is_active_hider() => {
                hider.status = PlayerStatus::Found;
                true
            }
            _ => false,
        };
        if !tagged {
            return false;
        }

        if let Some(sid) = seeker_id {
            if let Some(seeker) = self.players.get_mut(&sid) {
                seeker.tags += 1;
                seeker.score = seeker.score.saturating_add(crate::game::win::SCORE_PER_TAG);
            }
        }

        let event = GameEvent::hider_found(self.tick, *hider_id, seeker_id);
        self.push_event(event);
        true
    }

    /// Mark a hider Safe and set its den flag. Same guards as `mark_found`.
    pub fn mark_safe(&mut self, hider_id: &PlayerId) -> bool {
        if self.is_ended() {
            return false;
        }
        match self.players.get_mut(hider_id) {
            Some(hider) if hider.is_active_hider() => {
                hider.status = PlayerStatus::Safe;
                hider.reached_den = true;
            }
            _ => return false,
        }
        let event = GameEvent::hider_safe(self.tick, *hider_id);
        self.push_event(event);
        true
    }

    /// Record the final result and stop the clock. The first call wins.
    pub fn finish(&mut self, result: MatchResult, reason: EndReason) -> bool {
        if self.result != MatchResult::None {
            return false;
        }
        if let Some(from) = self.clock.end() {
            let event = GameEvent::phase_changed(self.tick, from, MatchPhase::Ended);
            self.push_event(event);
        }
        self.result = result;
        self.end_reason = Some(reason);
        let event = GameEvent::match_ended(self.tick, result, reason);
        self.push_event(event);
        true
    }

    /// Digest of every player's role, status and den flag.
    pub fn flags_digest(&self) -> StateHash {
        let mut hasher = StateHasher::for_player_flags();
        for player in self.players.values() {
            player.hash_into(&mut hasher);
        }
        hasher.finalize()
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        events.sort();
        events
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;

    fn state_with(players: &[(u8, Role)]) -> MatchState {
        let mut state = MatchState::new("test", MatchMode::Multiplayer, MatchClock::new(5, 5), 1);
        for (b, role) in players {
            let id = PlayerId::new([*b; 16]);
            state.players.insert(id, Player::new(id, *role, Controller::Human, FixedVec2::ZERO));
        }
        state
    }

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::new([0; 16]);
        let id2 = PlayerId::new([1; 16]);
        let id3 = PlayerId::new([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(id1 < id2);
        assert!(id1 < id3);
        assert!(id3 < id2);
    }

    #[test]
    fn test_player_id_serde_as_uuid() {
        let id = PlayerId::from_uuid_str("6f1c2a52-1d3e-4c1f-9a55-0b8f0f0e7a11").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c2a52-1d3e-4c1f-9a55-0b8f0f0e7a11\"");
        let back: PlayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<PlayerId>("\"nope\"").is_err());
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut state = state_with(&[(1, Role::Hider), (2, Role::Seeker)]);
        let hider = PlayerId::new([1; 16]);
        let seeker = PlayerId::new([2; 16]);

        assert!(state.mark_found(&hider, Some(seeker)));
        assert!(!state.mark_found(&hider, Some(seeker)));
        assert!(!state.mark_safe(&hider));

        let h = &state.players[&hider];
        assert_eq!(h.status, PlayerStatus::Found);
        assert!(!h.reached_den);
        assert_eq!(state.players[&seeker].tags, 1);
    }

    #[test]
    fn test_seekers_cannot_be_resolved() {
        let mut state = state_with(&[(2, Role::Seeker)]);
        let seeker = PlayerId::new([2; 16]);
        assert!(!state.mark_found(&seeker, None));
        assert!(!state.mark_safe(&seeker));
    }

    #[test]
    fn test_safe_sets_den_flag() {
        let mut state = state_with(&[(1, Role::Hider)]);
        let hider = PlayerId::new([1; 16]);
        assert!(state.mark_safe(&hider));
        assert!(state.players[&hider].reached_den);
        let events = state.take_events();
        assert!(matches!(events[0].data, GameEventData::HiderSafe { .. }));
    }

    #[test]
    fn test_finish_once() {
        let mut state = state_with(&[(1, Role::Hider)]);
        assert!(state.finish(MatchResult::HiderWin, EndReason::TimerExpired));
        assert!(!state.finish(MatchResult::SeekerWin, EndReason::AllHidersResolved));
        assert_eq!(state.result, MatchResult::HiderWin);
        assert_eq!(state.phase(), MatchPhase::Ended);

        // No status changes after the end.
        assert!(!state.mark_safe(&PlayerId::new([1; 16])));
    }

    #[test]
    fn test_flags_digest_tracks_status() {
        let mut a = state_with(&[(1, Role::Hider), (2, Role::Hider)]);
        let b = a.clone();
        assert_eq!(a.flags_digest(), b.flags_digest());
        a.mark_safe(&PlayerId::new([2; 16]));
        assert_ne!(a.flags_digest(), b.flags_digest());
    }
}
