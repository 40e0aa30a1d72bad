//! Match Engine
//!
//! Root of the simulation: owns the arena, the match state, the AI and the
//! outbox of locally-authored changes. Commands are synchronous and never
//! block; the tick entry points live in [`crate::game::tick`].
//!
//! ```text
//!   commands ──► submit_move / report_tag / report_den_arrival ──┐
//!   clock    ──► clock_tick (1 Hz)                               ├─► MatchState ─► events
//!   sim      ──► sim_tick   (20 Hz, AI + arrival checks)         │                 outbox (owned changes)
//!   network  ──► apply_remote (merged FieldChanges)             ─┘
//! ```
//!
//! ## Authority
//!
//! Every field has one writer. A multiplayer client (`Authority::Local`)
//! writes its own position and den flag, plus other players' found flags
//! when it is a seeker. Anything else arrives through `apply_remote`.
//! `Authority::Host` writes everything and is what single-seeker matches use.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, MatchConfig, SimParams};
use crate::core::hash::StateHash;
use crate::core::vec2::FixedVec2;
use crate::game::arena::{Arena, ArenaDefinition, ArenaError};
use crate::game::clock::MatchClock;
use crate::game::events::GameEvent;
use crate::game::motion::{try_step, MoveCommand, MoveOutcome, RejectReason};
use crate::game::roles::assign_roles;
use crate::game::seeker_ai::{AiMode, SeekerAi};
use crate::game::state::{
    Controller, EndReason, MatchMode, MatchPhase, MatchResult, MatchState, Player, PlayerId, Role,
};
use crate::game::visibility::can_see;
use crate::game::win::{build_outcome, evaluate_multiplayer, settle_scores, MatchOutcome};

// =============================================================================
// ERRORS
// =============================================================================

/// Engine errors. Rejected moves and out-of-range tags are not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Arena definition missing or malformed
    #[error("arena: {0}")]
    Arena(#[from] ArenaError),

    /// Match configuration out of range
    #[error("config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// No such player in this match
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// Player already joined
    #[error("player {0} already in match")]
    DuplicatePlayer(PlayerId),

    /// This engine instance may not write that field
    #[error("not the owner of player {player}'s state")]
    NotOwner {
        /// Player whose field was targeted
        player: PlayerId,
    },

    /// Command needs a different role
    #[error("player {player} is not a {expected:?}")]
    WrongRole {
        /// Offending player
        player: PlayerId,
        /// Role the command needs
        expected: Role,
    },

    /// Mode has no free slot for that role
    #[error("no {0:?} slot available")]
    RoleUnavailable(Role),
}

// =============================================================================
// AUTHORITY / CHANGES
// =============================================================================

/// Which fields this engine instance may write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// Writes every field
    Host,
    /// Multiplayer client acting for one player
    Local(PlayerId),
}

impl Authority {
    /// May write `player`'s position and den flag.
    #[inline]
    pub fn owns_player(&self, player: &PlayerId) -> bool {
        match self {
            Authority::Host => true,
            Authority::Local(me) => me == player,
        }
    }
}

/// A single field-level state change, as produced locally (outbox) or
/// merged from the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    /// New position
    Position {
        /// Player
        player: PlayerId,
        /// Cell top-left corner
        position: FixedVec2,
    },
    /// Hider tagged
    Found {
        /// Hider
        player: PlayerId,
    },
    /// Hider reached the den
    ReachedDen {
        /// Hider
        player: PlayerId,
    },
}

impl FieldChange {
    /// Player the change is about.
    pub fn player(&self) -> PlayerId {
        match self {
            FieldChange::Position { player, .. }
            | FieldChange::Found { player }
            | FieldChange::ReachedDen { player } => *player,
        }
    }
}

/// Result of `report_tag`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOutcome {
    /// Hider is now Found
    Tagged,
    /// Not strictly within the tag radius
    OutOfRange,
    /// Tags only count while seeking
    NotSeeking,
    /// Hider was already Found or Safe
    AlreadyResolved,
}

/// Result of `report_den_arrival`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenOutcome {
    /// Hider is now Safe
    Reached,
    /// A pursuing seeker was already home; the hider is Found
    Beaten,
    /// Not within the den radius
    NotAtDen,
    /// Arrival only counts while seeking
    NotSeeking,
    /// Hider was already Found or Safe
    AlreadyResolved,
}

// =============================================================================
// ENGINE
// =============================================================================

/// One running match.
pub struct MatchEngine {
    pub(crate) arena: Arena,
    pub(crate) params: SimParams,
    pub(crate) authority: Authority,
    pub(crate) state: MatchState,
    pub(crate) ai: Option<SeekerAi>,
    pub(crate) outbox: Vec<FieldChange>,
}

impl MatchEngine {
    /// Build the arena from its definition and start a match in Hiding.
    pub fn new(
        match_id: impl Into<String>,
        arena: &ArenaDefinition,
        config: &MatchConfig,
        mode: MatchMode,
        authority: Authority,
        seed: u64,
    ) -> Result<Self, EngineError> {
        Self::with_arena(match_id, arena.build()?, config, mode, authority, seed)
    }

    /// Start a match on an already validated arena.
    pub fn with_arena(
        match_id: impl Into<String>,
        arena: Arena,
        config: &MatchConfig,
        mode: MatchMode,
        authority: Authority,
        seed: u64,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let params = config.sim_params(arena.den_radius());
        let clock = MatchClock::new(params.hiding_duration, params.seeking_duration);
        let mut state = MatchState::new(match_id, mode, clock, seed);

        let ai = match mode {
            MatchMode::SingleSeeker => {
                let id = PlayerId::AI_SEEKER;
                state
                    .players
                    .insert(id, Player::new(id, Role::Seeker, Controller::Ai, arena.den_start()));
                Some(SeekerAi::new())
            }
            MatchMode::Multiplayer => None,
        };

        info!(
            "Match {} created: {:?}, {} obstacles, den r={}",
            state.match_id,
            mode,
            arena.obstacles().len(),
            crate::core::fixed::to_float(params.den_radius),
        );

        Ok(Self {
            arena,
            params,
            authority,
            state,
            ai,
            outbox: Vec::new(),
        })
    }

    /// Single-seeker match with one human hider already joined.
    pub fn single_player(
        match_id: impl Into<String>,
        arena: &ArenaDefinition,
        config: &MatchConfig,
        hider: PlayerId,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(match_id, arena, config, MatchMode::SingleSeeker, Authority::Host, seed)?;
        engine.join(hider, Role::Hider)?;
        Ok(engine)
    }

    // =========================================================================
    // LOBBY
    // =========================================================================

    /// Add a player. Hiders get a spawn point, seekers start on the den.
    pub fn join(&mut self, id: PlayerId, role: Role) -> Result<FixedVec2, EngineError> {
        if self.state.players.contains_key(&id) || id == PlayerId::AI_SEEKER {
            return Err(EngineError::DuplicatePlayer(id));
        }
        if self.state.mode == MatchMode::SingleSeeker
            && (role == Role::Seeker || self.state.hiders().next().is_some())
        {
            return Err(EngineError::RoleUnavailable(role));
        }

        let position = match role {
            Role::Hider => {
                let spawn = self.arena.select_spawn(self.params.min_spawn_distance, &mut self.state.rng);
                if !spawn.qualified {
                    debug!("No spawn far enough from the den; using farthest for {}", id.short());
                }
                spawn.position
            }
            Role::Seeker => self.arena.den_start(),
        };

        self.state
            .players
            .insert(id, Player::new(id, role, Controller::Human, position));
        info!("Player {} joined match {} as {:?}", id.short(), self.state.match_id, role);
        Ok(position)
    }

    /// Seat a whole multiplayer lobby, drawing roles from the match RNG.
    pub fn seat_lobby(&mut self, lobby: &[PlayerId]) -> Result<BTreeMap<PlayerId, Role>, EngineError> {
        if self.state.mode != MatchMode::Multiplayer {
            return Err(EngineError::RoleUnavailable(Role::Seeker));
        }
        let roles = assign_roles(lobby, self.params.seeker_count, &mut self.state.rng);
        for (id, role) in &roles {
            self.join(*id, *role)?;
        }
        Ok(roles)
    }

    /// Remove a player. Remaining hiders may complete the match.
    pub fn leave(&mut self, id: &PlayerId) -> Result<(), EngineError> {
        if *id == PlayerId::AI_SEEKER || self.state.players.remove(id).is_none() {
            return Err(EngineError::UnknownPlayer(*id));
        }
        info!("Player {} left match {}", id.short(), self.state.match_id);
        self.check_multiplayer_end();
        Ok(())
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Move a human player one cell. Rejections leave everything unchanged.
    pub fn submit_move(&mut self, id: PlayerId, command: MoveCommand) -> Result<MoveOutcome, EngineError> {
        let player = self.state.get_player(&id).ok_or(EngineError::UnknownPlayer(id))?;
        if !self.authority.owns_player(&id) {
            return Err(EngineError::NotOwner { player: id });
        }

        let immobile = self.state.is_ended()
            || !player.is_active()
            || player.controller == Controller::Ai
            || (player.role == Role::Seeker && self.state.phase() == MatchPhase::Hiding);
        if immobile {
            return Ok(MoveOutcome::Rejected { reason: RejectReason::Immobile });
        }

        let outcome = try_step(&self.arena, player.position, command);
        if let MoveOutcome::Moved { position } = outcome {
            self.set_position(id, position);
            self.outbox.push(FieldChange::Position { player: id, position });
            self.detect_owned_transitions();
        }
        Ok(outcome)
    }

    /// A seeker claims a tag. Range and phase are checked here; remote
    /// `Found` changes are trusted as-is by `apply_remote`.
    pub fn report_tag(&mut self, seeker: PlayerId, target: PlayerId) -> Result<TagOutcome, EngineError> {
        let s = self.state.get_player(&seeker).ok_or(EngineError::UnknownPlayer(seeker))?;
        let t = self.state.get_player(&target).ok_or(EngineError::UnknownPlayer(target))?;
        if s.role != Role::Seeker {
            return Err(EngineError::WrongRole { player: seeker, expected: Role::Seeker });
        }
        if t.role != Role::Hider {
            return Err(EngineError::WrongRole { player: target, expected: Role::Hider });
        }
        if !self.authority.owns_player(&seeker) {
            return Err(EngineError::NotOwner { player: target });
        }

        if !t.is_active() {
            return Ok(TagOutcome::AlreadyResolved);
        }
        if self.state.phase() != MatchPhase::Seeking {
            return Ok(TagOutcome::NotSeeking);
        }
        if !s.position.strictly_within(t.position, self.params.tag_radius) {
            return Ok(TagOutcome::OutOfRange);
        }

        self.tag(seeker, target);
        match self.state.mode {
            MatchMode::Multiplayer => self.check_multiplayer_end(),
            MatchMode::SingleSeeker => self.end_match(MatchResult::SeekerWin, EndReason::AllHidersResolved),
        }
        Ok(TagOutcome::Tagged)
    }

    /// A hider claims the den.
    pub fn report_den_arrival(&mut self, id: PlayerId) -> Result<DenOutcome, EngineError> {
        let player = self.state.get_player(&id).ok_or(EngineError::UnknownPlayer(id))?;
        if player.role != Role::Hider {
            return Err(EngineError::WrongRole { player: id, expected: Role::Hider });
        }
        if !self.authority.owns_player(&id) {
            return Err(EngineError::NotOwner { player: id });
        }

        if !player.is_active() {
            return Ok(DenOutcome::AlreadyResolved);
        }
        if self.state.phase() != MatchPhase::Seeking {
            return Ok(DenOutcome::NotSeeking);
        }
        if !self.arena.is_at_den(player.position, self.params.den_radius) {
            return Ok(DenOutcome::NotAtDen);
        }

        match self.state.mode {
            MatchMode::SingleSeeker => match self.resolve_den_race(id) {
                MatchResult::SeekerWin => Ok(DenOutcome::Beaten),
                _ => Ok(DenOutcome::Reached),
            },
            MatchMode::Multiplayer => {
                self.reach_den(id);
                self.check_multiplayer_end();
                Ok(DenOutcome::Reached)
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Match id.
    pub fn match_id(&self) -> &str {
        &self.state.match_id
    }

    /// Single-seeker or multiplayer.
    pub fn mode(&self) -> MatchMode {
        self.state.mode
    }

    /// Who this engine writes for.
    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// The arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Fixed-point tuning in effect.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.state.phase()
    }

    /// Seconds left in the current phase.
    pub fn time_remaining(&self) -> u32 {
        self.state.clock.time_remaining()
    }

    /// Simulation ticks run so far.
    pub fn tick(&self) -> u32 {
        self.state.tick
    }

    /// Every player, in id order.
    pub fn player_states(&self) -> impl Iterator<Item = &Player> {
        self.state.players.values()
    }

    /// One player.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.state.get_player(id)
    }

    /// Result so far.
    pub fn result(&self) -> MatchResult {
        self.state.result
    }

    /// Final standings once ended.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.state.is_ended().then(|| build_outcome(&self.state))
    }

    /// AI mode in single-seeker matches.
    pub fn ai_mode(&self) -> Option<AiMode> {
        self.ai.as_ref().map(|ai| ai.mode())
    }

    /// Whether a hider can currently see any active seeker.
    pub fn hider_can_see_seeker(&self, hider: &PlayerId) -> Result<bool, EngineError> {
        let h = self.state.get_player(hider).ok_or(EngineError::UnknownPlayer(*hider))?;
        let radius = self.params.vision_radius;
        Ok(self
            .state
            .seekers()
            .any(|s| can_see(&self.arena, h.position, s.position, radius)))
    }

    /// Other players inside `observer`'s vision radius with a clear line.
    pub fn visible_players(&self, observer: &PlayerId) -> Result<Vec<PlayerId>, EngineError> {
        let o = self.state.get_player(observer).ok_or(EngineError::UnknownPlayer(*observer))?;
        let radius = self.params.vision_radius;
        Ok(self
            .state
            .players
            .values()
            .filter(|p| p.id != *observer)
            .filter(|p| can_see(&self.arena, o.position, p.position, radius))
            .map(|p| p.id)
            .collect())
    }

    /// Digest of every player's role, status and den flag.
    pub fn state_digest(&self) -> StateHash {
        self.state.flags_digest()
    }

    /// Drain events, ordered by (tick, priority, player).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.state.take_events()
    }

    /// Drain locally-authored changes for broadcast and persistence.
    pub fn take_outbox(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.outbox)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    pub(crate) fn set_position(&mut self, id: PlayerId, position: FixedVec2) {
        if let Some(player) = self.state.get_player_mut(&id) {
            player.position = position;
            let event = GameEvent::player_moved(self.state.tick, id, position);
            self.state.push_event(event);
        }
    }

    pub(crate) fn tag(&mut self, seeker: PlayerId, hider: PlayerId) -> bool {
        if !self.state.mark_found(&hider, Some(seeker)) {
            return false;
        }
        info!("Hider {} tagged by {}", hider.short(), seeker.short());
        if seeker != PlayerId::AI_SEEKER {
            self.outbox.push(FieldChange::Found { player: hider });
        }
        true
    }

    pub(crate) fn reach_den(&mut self, hider: PlayerId) -> bool {
        if !self.state.mark_safe(&hider) {
            return false;
        }
        info!("Hider {} reached the den", hider.short());
        self.outbox.push(FieldChange::ReachedDen { player: hider });
        true
    }

    /// Single-seeker den race for a hider standing in the den.
    pub(crate) fn resolve_den_race(&mut self, hider: PlayerId) -> MatchResult {
        let mode = self.ai_mode().unwrap_or_default();
        let seeker_in_den = self
            .state
            .get_player(&PlayerId::AI_SEEKER)
            .map(|s| self.arena.is_at_den(s.position, self.params.den_radius))
            .unwrap_or(false);

        let result = crate::game::win::evaluate_single_den_race(mode, seeker_in_den);
        match result {
            MatchResult::SeekerWin => {
                self.tag(PlayerId::AI_SEEKER, hider);
                self.end_match(MatchResult::SeekerWin, EndReason::SeekerReturned);
            }
            _ => {
                self.reach_den(hider);
                self.end_match(MatchResult::HiderWin, EndReason::DenReached);
            }
        }
        result
    }

    pub(crate) fn check_multiplayer_end(&mut self) {
        if self.state.mode != MatchMode::Multiplayer || self.state.phase() != MatchPhase::Seeking {
            return;
        }
        if let Some(result) = evaluate_multiplayer(&self.state) {
            self.end_match(result, EndReason::AllHidersResolved);
        }
    }

    /// Ends only from Seeking, or once the timer has already moved the
    /// clock to Ended. A match never skips the seeking phase.
    pub(crate) fn end_match(&mut self, result: MatchResult, reason: EndReason) {
        if self.state.phase() == MatchPhase::Hiding {
            debug!("Match {} still hiding, not ending with {:?}", self.state.match_id, result);
            return;
        }
        if self.state.finish(result, reason) {
            settle_scores(&mut self.state);
            info!("Match {} ended: {:?} ({:?})", self.state.match_id, result, reason);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::motion::Direction;
    use crate::game::state::PlayerStatus;

    fn definition() -> ArenaDefinition {
        ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0)
            .with_spawn(40.0, 40.0)
            .with_spawn(440.0, 240.0)
    }

    fn multiplayer(authority: Authority) -> MatchEngine {
        MatchEngine::new("mp", &definition(), &MatchConfig::default(), MatchMode::Multiplayer, authority, 3)
            .unwrap()
    }

    fn id(b: u8) -> PlayerId {
        PlayerId::new([b; 16])
    }

    fn start_seeking(engine: &mut MatchEngine) {
        for _ in 0..engine.params().hiding_duration {
            engine.clock_tick();
        }
        assert_eq!(engine.phase(), MatchPhase::Seeking);
    }

    #[test]
    fn test_bad_arena_is_fatal() {
        let def = ArenaDefinition::new(0.0, 300.0, 10.0, 10.0, 30.0).with_spawn(0.0, 0.0);
        let err = MatchEngine::new("x", &def, &MatchConfig::default(), MatchMode::Multiplayer, Authority::Host, 1);
        assert!(matches!(err, Err(EngineError::Arena(_))));

        let mut config = MatchConfig::default();
        config.tag_radius = f64::NAN;
        let err = MatchEngine::new("x", &definition(), &config, MatchMode::Multiplayer, Authority::Host, 1);
        assert!(matches!(err, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_join_rules() {
        let mut engine = multiplayer(Authority::Host);
        let seeker_pos = engine.join(id(9), Role::Seeker).unwrap();
        assert_eq!(seeker_pos, engine.arena().den_start());
        engine.join(id(1), Role::Hider).unwrap();
        assert!(matches!(engine.join(id(1), Role::Hider), Err(EngineError::DuplicatePlayer(_))));

        let mut single = MatchEngine::single_player("s", &definition(), &MatchConfig::default(), id(1), 3).unwrap();
        assert!(matches!(single.join(id(2), Role::Hider), Err(EngineError::RoleUnavailable(Role::Hider))));
        assert!(matches!(single.join(id(2), Role::Seeker), Err(EngineError::RoleUnavailable(Role::Seeker))));
        assert_eq!(single.player_states().count(), 2);
    }

    #[test]
    fn test_seekers_frozen_while_hiding() {
        let mut engine = multiplayer(Authority::Host);
        engine.join(id(9), Role::Seeker).unwrap();
        let out = engine.submit_move(id(9), MoveCommand::step(Direction::Left)).unwrap();
        assert_eq!(out, MoveOutcome::Rejected { reason: RejectReason::Immobile });

        start_seeking(&mut engine);
        let out = engine.submit_move(id(9), MoveCommand::step(Direction::Left)).unwrap();
        assert!(out.is_moved());
        assert_eq!(engine.take_outbox().len(), 1);
    }

    #[test]
    fn test_local_authority_boundaries() {
        let mut engine = multiplayer(Authority::Local(id(1)));
        engine.join(id(1), Role::Hider).unwrap();
        engine.join(id(2), Role::Hider).unwrap();
        engine.join(id(9), Role::Seeker).unwrap();

        assert!(matches!(
            engine.submit_move(id(2), MoveCommand::step(Direction::Up)),
            Err(EngineError::NotOwner { .. })
        ));
        assert!(matches!(engine.report_tag(id(9), id(2)), Err(EngineError::NotOwner { .. })));
        assert!(matches!(engine.report_den_arrival(id(2)), Err(EngineError::NotOwner { .. })));
        assert!(matches!(engine.report_tag(id(1), id(2)), Err(EngineError::WrongRole { .. })));
    }

    #[test]
    fn test_tag_requires_strict_range_and_seeking() {
        let mut engine = multiplayer(Authority::Host);
        engine.join(id(9), Role::Seeker).unwrap();
        engine.join(id(1), Role::Hider).unwrap();
        engine.join(id(2), Role::Hider).unwrap();
        assert_eq!(engine.report_tag(id(9), id(1)).unwrap(), TagOutcome::NotSeeking);

        start_seeking(&mut engine);
        let den = engine.arena().den_start();
        engine.set_position(id(1), den + FixedVec2::from_ints(25, 0));
        assert_eq!(engine.report_tag(id(9), id(1)).unwrap(), TagOutcome::OutOfRange);

        engine.set_position(id(1), den + FixedVec2::from_ints(20, 0));
        assert_eq!(engine.report_tag(id(9), id(1)).unwrap(), TagOutcome::Tagged);
        assert_eq!(engine.report_tag(id(9), id(1)).unwrap(), TagOutcome::AlreadyResolved);
        assert_eq!(engine.player(&id(1)).unwrap().status, PlayerStatus::Found);
        assert_eq!(engine.phase(), MatchPhase::Seeking);
    }

    #[test]
    fn test_den_arrival_multiplayer() {
        let mut engine = multiplayer(Authority::Local(id(1)));
        engine.join(id(1), Role::Hider).unwrap();
        engine.join(id(9), Role::Seeker).unwrap();
        assert_eq!(engine.report_den_arrival(id(1)).unwrap(), DenOutcome::NotSeeking);

        start_seeking(&mut engine);
        assert_eq!(engine.report_den_arrival(id(1)).unwrap(), DenOutcome::NotAtDen);

        let near = engine.arena().den_center() + FixedVec2::from_ints(0, 20);
        engine.set_position(id(1), near);
        assert_eq!(engine.report_den_arrival(id(1)).unwrap(), DenOutcome::Reached);
        assert!(engine.player(&id(1)).unwrap().reached_den);
        assert_eq!(engine.result(), MatchResult::HiderWin);
        assert!(engine.take_outbox().contains(&FieldChange::ReachedDen { player: id(1) }));
    }

    #[test]
    fn test_leave_can_finish_match() {
        let mut engine = multiplayer(Authority::Host);
        engine.join(id(9), Role::Seeker).unwrap();
        engine.join(id(1), Role::Hider).unwrap();
        engine.join(id(2), Role::Hider).unwrap();
        start_seeking(&mut engine);

        let den = engine.arena().den_start();
        engine.set_position(id(1), den);
        assert_eq!(engine.report_tag(id(9), id(1)).unwrap(), TagOutcome::Tagged);
        assert_eq!(engine.phase(), MatchPhase::Seeking);

        engine.leave(&id(2)).unwrap();
        assert_eq!(engine.result(), MatchResult::SeekerWin);
        assert!(matches!(engine.leave(&id(2)), Err(EngineError::UnknownPlayer(_))));
    }

    #[test]
    fn test_seat_lobby() {
        let mut engine = multiplayer(Authority::Host);
        let lobby: Vec<PlayerId> = (1..=8).map(id).collect();
        let roles = engine.seat_lobby(&lobby).unwrap();
        assert_eq!(roles.len(), 8);
        assert_eq!(engine.player_states().filter(|p| p.role == Role::Seeker).count(), 2);
    }

    #[test]
    fn test_visibility_queries() {
        let mut engine = multiplayer(Authority::Host);
        engine.join(id(9), Role::Seeker).unwrap();
        engine.join(id(1), Role::Hider).unwrap();
        engine.set_position(id(1), engine.arena().den_start() + FixedVec2::from_ints(40, 0));
        assert!(engine.hider_can_see_seeker(&id(1)).unwrap());
        assert_eq!(engine.visible_players(&id(9)).unwrap(), vec![id(1)]);
        assert!(engine.hider_can_see_seeker(&id(5)).is_err());
    }
}
