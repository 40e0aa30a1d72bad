//! Line of Sight
//!
//! Sampled segment test against opaque obstacles only. Trees, cars and the
//! other see-through obstacle types never block sight, even though they
//! block movement.
//!
//! ```text
//!   a ●─·─·─·─·─┬──┬·─·─● b     samples every 5 units
//!               │▓▓│            a sample inside a wall/building
//!               └──┘            footprint (edges included) blocks
//! ```

use crate::core::fixed::{Fixed, LOS_SAMPLE_STEP, ceil_steps};
use crate::core::vec2::FixedVec2;
use crate::game::arena::Arena;

/// Whether the segment `a → b` is free of opaque obstacles.
///
/// Endpoints are put in a canonical order before sampling, so the answer
/// is identical for `(a, b)` and `(b, a)`.
pub fn has_line_of_sight(arena: &Arena, a: FixedVec2, b: FixedVec2) -> bool {
    let (from, to) = if a <= b { (a, b) } else { (b, a) };
    let delta = to - from;
    let steps = ceil_steps(delta.length(), LOS_SAMPLE_STEP);

    if steps == 0 {
        return !arena.blocks_sight(from);
    }

    let steps = steps as i64;
    (0..=steps).all(|i| {
        let sample = FixedVec2::new(
            from.x + ((delta.x as i64 * i) / steps) as Fixed,
            from.y + ((delta.y as i64 * i) / steps) as Fixed,
        );
        !arena.blocks_sight(sample)
    })
}

/// Within `radius` (inclusive) and with a clear line of sight.
pub fn can_see(arena: &Arena, observer: FixedVec2, target: FixedVec2, radius: Fixed) -> bool {
    observer.within(target, radius) && has_line_of_sight(arena, observer, target)
}
