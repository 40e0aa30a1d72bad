//! Seeker AI
//!
//! Behavior for the engine-driven seeker in single-seeker matches.
//!
//! ```text
//!            canSee(seeker, hider, vision)
//!   Hunting ──────────────────────────────► Pursuing ──(within den radius)──► SeekerWin
//!   chase the hider                          race back to the den
//!   speed × 1                                speed × pursuit multiplier
//! ```
//!
//! The switch to Pursuing is permanent. Movement is continuous (fixed-point
//! steps, not whole cells) but every candidate position is collision-checked
//! against the arena, so the seeker never overlaps an obstacle.
//!
//! ## Navigation
//!
//! - [`Navigation::Greedy`]: step straight at the target; when that collides,
//!   try a fixed ladder of offsets and take the first free one. This is a
//!   local heuristic and can dead-end behind concave obstacles.
//! - [`Navigation::GridSearch`]: breadth-first search over free grid cells,
//!   capped at `node_budget` expansions per tick. The seeker heads for the
//!   first cell of the path. When the budget runs out or no path exists it
//!   falls back to the greedy ladder, so a small budget keeps the "can get
//!   stuck" behavior as a difficulty setting.

use std::collections::{BTreeMap, VecDeque};
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, fixed_mul, DIAGONAL_FACTOR, ESCAPE_JUMP_FACTOR};
use crate::core::vec2::FixedVec2;
use crate::game::arena::Arena;
use crate::game::motion::first_free;
use crate::game::visibility::can_see;

/// Behavior mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Chasing the hider
    #[default]
    Hunting,
    /// Hider spotted; racing to the den
    Pursuing,
}

/// Obstacle-avoidance strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Navigation {
    /// Straight line plus fixed fallback offsets
    #[default]
    Greedy,
    /// Capped breadth-first search over free cells
    GridSearch {
        /// Max cells expanded per tick (0 behaves like `Greedy`)
        #[serde(rename = "nodeBudget")]
        node_budget: u32,
    },
}

/// Tuning the AI reads every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AiParams {
    /// Base step length per simulation tick
    pub speed: Fixed,
    /// Pursuing speed factor
    pub pursuit_multiplier: Fixed,
    /// Detection radius
    pub vision_radius: Fixed,
    /// Den arrival radius
    pub den_radius: Fixed,
    /// Avoidance strategy
    pub navigation: Navigation,
}

/// What one AI tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AiStep {
    /// Position after the tick
    pub position: FixedVec2,
    /// Position changed
    pub moved: bool,
    /// Hunting → Pursuing happened this tick
    pub spotted: bool,
    /// Seeker was inside the den radius while Pursuing
    pub reached_den: bool,
    /// Every candidate collided
    pub stuck: bool,
}

impl AiStep {
    fn stay(position: FixedVec2) -> Self {
        Self {
            position,
            moved: false,
            spotted: false,
            reached_den: false,
            stuck: false,
        }
    }
}

/// Result of one bounded search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Next cell origin on a shortest path
    Waypoint(FixedVec2),
    /// Already in the target cell
    Arrived,
    /// Budget ran out before reaching the target
    Exhausted,
    /// Target not reachable through free cells
    Unreachable,
}

/// Per-match AI state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeekerAi {
    mode: AiMode,
    stuck_ticks: u32,
}

impl SeekerAi {
    /// Fresh AI in Hunting mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    #[inline]
    pub fn mode(&self) -> AiMode {
        self.mode
    }

    /// Hider has been spotted.
    #[inline]
    pub fn is_pursuing(&self) -> bool {
        self.mode == AiMode::Pursuing
    }

    /// Consecutive ticks without a free candidate.
    #[inline]
    pub fn stuck_ticks(&self) -> u32 {
        self.stuck_ticks
    }

    /// Run one simulation tick.
    ///
    /// Order: detection, then (if Pursuing) the den check, then movement.
    /// `hider` is `None` when there is nobody left to chase.
    pub fn step(
        &mut self,
        arena: &Arena,
        params: &AiParams,
        seeker: FixedVec2,
        hider: Option<FixedVec2>,
    ) -> AiStep {
        let mut out = AiStep::stay(seeker);

        if self.mode == AiMode::Hunting {
            if let Some(h) = hider {
                if can_see(arena, seeker, h, params.vision_radius) {
                    self.mode = AiMode::Pursuing;
                    out.spotted = true;
                }
            }
        }

        let (target, speed, ladder) = match self.mode {
            AiMode::Pursuing => {
                if arena.is_at_den(seeker, params.den_radius) {
                    out.reached_den = true;
                    return out;
                }
                let speed = fixed_mul(params.speed, params.pursuit_multiplier);
                (arena.den_center(), speed, Ladder::Pursuing)
            }
            AiMode::Hunting => match hider {
                Some(h) => (h, params.speed, Ladder::Hunting),
                None => return out,
            },
        };

        match navigate(arena, params.navigation, seeker, target, speed, ladder) {
            Some(next) => {
                self.stuck_ticks = 0;
                out.moved = next != seeker;
                out.position = next;
            }
            None => {
                self.stuck_ticks += 1;
                out.stuck = true;
            }
        }
        out
    }
}

// =============================================================================
// MOVEMENT
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ladder {
    Hunting,
    Pursuing,
}

fn navigate(
    arena: &Arena,
    navigation: Navigation,
    from: FixedVec2,
    target: FixedVec2,
    speed: Fixed,
    ladder: Ladder,
) -> Option<FixedVec2> {
    if let Navigation::GridSearch { node_budget } = navigation {
        if node_budget > 0 {
            let waypoint = match grid_search(arena, from, target, node_budget) {
                SearchOutcome::Waypoint(w) => Some(w),
                SearchOutcome::Arrived => Some(target),
                SearchOutcome::Exhausted | SearchOutcome::Unreachable => None,
            };
            if let Some(w) = waypoint {
                let next = arena.clamp_to_bounds(from + bounded_step(from, w, speed));
                if arena.is_free(next) {
                    return Some(next);
                }
            }
        }
    }
    greedy_step(arena, from, target, speed, ladder)
}

/// Step toward `to` of at most `speed`, landing exactly on `to` when closer.
fn bounded_step(from: FixedVec2, to: FixedVec2, speed: Fixed) -> FixedVec2 {
    if from.within(to, speed) {
        to - from
    } else {
        from.step_toward(to, speed)
    }
}

/// Straight step plus the fallback ladder. `None` when everything collides.
fn greedy_step(
    arena: &Arena,
    from: FixedVec2,
    target: FixedVec2,
    speed: Fixed,
    ladder: Ladder,
) -> Option<FixedVec2> {
    let primary = from + from.step_toward(target, speed);
    let diag = fixed_mul(speed, DIAGONAL_FACTOR);

    let mut offsets: Vec<FixedVec2> = Vec::with_capacity(15);
    if ladder == Ladder::Pursuing {
        let sx = if target.x > from.x { speed } else { -speed };
        let sy = if target.y > from.y { speed } else { -speed };
        offsets.push(FixedVec2::new(sx, 0));
        offsets.push(FixedVec2::new(0, sy));
    }
    offsets.extend_from_slice(&[
        FixedVec2::new(speed, 0),
        FixedVec2::new(-speed, 0),
        FixedVec2::new(0, speed),
        FixedVec2::new(0, -speed),
        FixedVec2::new(diag, diag),
        FixedVec2::new(-diag, diag),
        FixedVec2::new(diag, -diag),
        FixedVec2::new(-diag, -diag),
    ]);
    if ladder == Ladder::Pursuing {
        let jump = fixed_mul(speed, ESCAPE_JUMP_FACTOR);
        offsets.extend_from_slice(&[
            FixedVec2::new(jump, 0),
            FixedVec2::new(-jump, 0),
            FixedVec2::new(0, jump),
            FixedVec2::new(0, -jump),
        ]);
    }

    first_free(
        arena,
        std::iter::once(primary).chain(offsets.into_iter().map(|o| from + o)),
    )
}

/// Capped breadth-first search from the cell nearest `from` to the cell
/// nearest `target`.
///
/// A seeker part-way between two cells keeps heading for the next cell of
/// the path when it already lies on that leg; otherwise it first returns to
/// the origin of its own cell, so moves always run along free cells.
pub fn grid_search(arena: &Arena, from: FixedVec2, target: FixedVec2, node_budget: u32) -> SearchOutcome {
    let cell = arena.cell_size();
    let start_origin = from.snap(cell);
    let start = start_origin.cell_index(cell);
    let goal = target.snap(cell).cell_index(cell);

    if start == goal {
        return SearchOutcome::Arrived;
    }

    let mut parents: BTreeMap<(i32, i32), (i32, i32)> = BTreeMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    parents.insert(start, start);

    let mut expanded = 0u32;
    while let Some(current) = queue.pop_front() {
        if expanded >= node_budget {
            return SearchOutcome::Exhausted;
        }
        expanded += 1;

        let (cx, cy) = current;
        for next in [(cx + 1, cy), (cx - 1, cy), (cx, cy + 1), (cx, cy - 1)] {
            if parents.contains_key(&next) {
                continue;
            }
            if next != goal && !arena.is_cell_free(next.0, next.1) {
                continue;
            }
            parents.insert(next, current);
            if next == goal {
                let hop = first_hop(&parents, start, goal, arena);
                if from == start_origin || on_leg(from, start_origin, hop) {
                    return SearchOutcome::Waypoint(hop);
                }
                return SearchOutcome::Waypoint(start_origin);
            }
            queue.push_back(next);
        }
    }

    SearchOutcome::Unreachable
}

/// `p` lies on the axis-aligned segment `a`-`b`.
fn on_leg(p: FixedVec2, a: FixedVec2, b: FixedVec2) -> bool {
    let between = |v: i32, lo: i32, hi: i32| v >= lo.min(hi) && v <= lo.max(hi);
    (a.x == b.x && p.x == a.x && between(p.y, a.y, b.y))
        || (a.y == b.y && p.y == a.y && between(p.x, a.x, b.x))
}

fn first_hop(
    parents: &BTreeMap<(i32, i32), (i32, i32)>,
    start: (i32, i32),
    goal: (i32, i32),
    arena: &Arena,
) -> FixedVec2 {
    let mut hop = goal;
    while let Some(&parent) = parents.get(&hop) {
        if parent == start {
            break;
        }
        hop = parent;
    }
    arena.cell_origin(hop.0, hop.1)
}

// =============================================================================
// TESTS
// =============================================================================
