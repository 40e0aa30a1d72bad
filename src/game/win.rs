//! Win Conditions & Scoring
//!
//! ```text
//!   single seeker                          multiplayer
//!   ─────────────                          ───────────
//!   hider at den ─┬─ seeker Hunting  ─► H   all hiders resolved ─┬─ any Safe ─► H
//!                 └─ seeker Pursuing ─┐     (at least one hider)  └─ none     ─► S
//!                       seeker in den ├─► S
//!                       otherwise     └─► H  timer expiry (either mode) ─► H
//! ```
//!
//! Exact ties (hider arrives while a pursuing seeker already stands in the
//! den) go to the seeker.

use serde::{Serialize, Deserialize};

use crate::game::seeker_ai::AiMode;
use crate::game::state::{
    EndReason, MatchResult, MatchState, PlayerId, PlayerStatus, Role,
};

// =============================================================================
// SCORING
// =============================================================================

/// Hider that reached the den.
pub const SCORE_SAFE: u32 = 100;

/// Hider still Active when the match ended.
pub const SCORE_SURVIVED: u32 = 50;

/// Seeker, per hider tagged. Credited at tag time.
pub const SCORE_PER_TAG: u32 = 50;

/// Every seeker when the seekers win.
pub const SCORE_SEEKER_WIN: u32 = 100;

// =============================================================================
// EVALUATION
// =============================================================================

/// Result of a hider reaching the den in a single-seeker match.
pub fn evaluate_single_den_race(ai_mode: AiMode, seeker_in_den: bool) -> MatchResult {
    match ai_mode {
        AiMode::Hunting => MatchResult::HiderWin,
        AiMode::Pursuing if seeker_in_den => MatchResult::SeekerWin,
        AiMode::Pursuing => MatchResult::HiderWin,
    }
}

/// Multiplayer end check. `None` while any hider is still Active or when
/// the match has no hiders at all.
pub fn evaluate_multiplayer(state: &MatchState) -> Option<MatchResult> {
    let mut any_hider = false;
    let mut any_safe = false;
    for hider in state.hiders() {
        any_hider = true;
        match hider.status {
            PlayerStatus::Active => return None,
            PlayerStatus::Safe => any_safe = true,
            PlayerStatus::Found => {}
        }
    }
    if !any_hider {
        return None;
    }
    Some(if any_safe { MatchResult::HiderWin } else { MatchResult::SeekerWin })
}

/// Apply end-of-match points. Call once, after the result is final.
pub fn settle_scores(state: &mut MatchState) {
    let result = state.result;
    for player in state.players.values_mut() {
        let bonus = match (player.role, player.status) {
            (Role::Hider, PlayerStatus::Safe) => SCORE_SAFE,
            (Role::Hider, PlayerStatus::Active) => SCORE_SURVIVED,
            (Role::Hider, PlayerStatus::Found) => 0,
            (Role::Seeker, _) if result == MatchResult::SeekerWin => SCORE_SEEKER_WIN,
            (Role::Seeker, _) => 0,
        };
        player.score = player.score.saturating_add(bonus);
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// One row of the final standings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOutcome {
    /// Player
    pub id: PlayerId,
    /// Side played
    pub role: Role,
    /// Final status
    pub status: PlayerStatus,
    /// Final score
    pub score: u32,
}

/// Final result of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// Who won
    pub result: MatchResult,
    /// Standings, best score first (ties by id)
    pub per_player: Vec<PlayerOutcome>,
    /// Why the match ended
    pub end_reason: Option<EndReason>,
}

impl MatchOutcome {
    /// Top of the standings.
    pub fn leader(&self) -> Option<&PlayerOutcome> {
        self.per_player.first()
    }
}

/// Snapshot the standings.
pub fn build_outcome(state: &MatchState) -> MatchOutcome {
    let mut per_player: Vec<PlayerOutcome> = state
        .players
        .values()
        .map(|p| PlayerOutcome {
            id: p.id,
            role: p.role,
            status: p.status,
            score: p.score,
        })
        .collect();
    per_player.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));

    MatchOutcome {
        result: state.result,
        per_player,
        end_reason: state.end_reason,
    }
}
