//! Grid Motion
//!
//! Human players move exactly one cell per command. A step is either taken
//! whole or rejected whole, so remote observers never see a half-way
//! position. Rejection is a normal outcome, not an error.

use serde::{Serialize, Deserialize};

use crate::core::fixed::fixed_abs;
use crate::core::vec2::FixedVec2;
use crate::game::arena::Arena;

/// One of the four grid directions. +Y points down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// -Y
    Up,
    /// +Y
    Down,
    /// -X
    Left,
    /// +X
    Right,
}

impl Direction {
    /// Offset of a one-cell step.
    #[inline]
    pub fn offset(self, cell: i32) -> FixedVec2 {
        match self {
            Direction::Up => FixedVec2::new(0, -cell),
            Direction::Down => FixedVec2::new(0, cell),
            Direction::Left => FixedVec2::new(-cell, 0),
            Direction::Right => FixedVec2::new(cell, 0),
        }
    }
}

/// A movement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveCommand {
    /// Step one cell in a direction
    Step {
        /// Direction
        direction: Direction,
    },
    /// Step one cell toward a target cell (dominant axis, ties go horizontal)
    Toward {
        /// Target top-left corner
        target: FixedVec2,
    },
}

impl MoveCommand {
    /// Shorthand for `Step`.
    pub fn step(direction: Direction) -> Self {
        MoveCommand::Step { direction }
    }

    /// Resolve to a single direction from `from`. `None` when already there.
    pub fn direction_from(self, from: FixedVec2) -> Option<Direction> {
        match self {
            MoveCommand::Step { direction } => Some(direction),
            MoveCommand::Toward { target } => {
                let dx = target.x - from.x;
                let dy = target.y - from.y;
                if dx == 0 && dy == 0 {
                    None
                } else if fixed_abs(dx) >= fixed_abs(dy) {
                    Some(if dx > 0 { Direction::Right } else { Direction::Left })
                } else {
                    Some(if dy > 0 { Direction::Down } else { Direction::Up })
                }
            }
        }
    }
}

/// Why a move did not happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Target box leaves the arena
    OutOfBounds,
    /// Target box overlaps an obstacle
    Blocked,
    /// Already at the requested cell
    NoStep,
    /// Player may not move right now (resolved, wrong phase, match over)
    Immobile,
}

/// Result of a move request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// New position
    Moved {
        /// Where the player now is
        position: FixedVec2,
    },
    /// Position unchanged
    Rejected {
        /// Why
        reason: RejectReason,
    },
}

impl MoveOutcome {
    /// The move went through.
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Compute a one-cell step against the arena. Never returns a position
/// that is out of bounds or overlapping an obstacle.
pub fn try_step(arena: &Arena, from: FixedVec2, command: MoveCommand) -> MoveOutcome {
    let Some(direction) = command.direction_from(from) else {
        return MoveOutcome::Rejected { reason: RejectReason::NoStep };
    };

    let target = from + direction.offset(arena.cell_size());
    if !arena.in_bounds(target) {
        return MoveOutcome::Rejected { reason: RejectReason::OutOfBounds };
    }
    if arena.overlaps_obstacle(target) {
        return MoveOutcome::Rejected { reason: RejectReason::Blocked };
    }
    MoveOutcome::Moved { position: target }
}

/// First collision-free candidate, each clamped into the arena first.
///
/// Used by the AI fallback ladders: candidates are absolute positions in
/// priority order.
pub fn first_free(arena: &Arena, candidates: impl IntoIterator<Item = FixedVec2>) -> Option<FixedVec2> {
    candidates
        .into_iter()
        .map(|c| arena.clamp_to_bounds(c))
        .find(|c| arena.is_free(*c))
}
