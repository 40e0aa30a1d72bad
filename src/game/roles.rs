//! Role Assignment
//!
//! Multiplayer lobbies hand out roles once, when the match is created:
//! one seeker per four players, at least one, never more than the lobby
//! setting or three, and always leaving at least one hider.

use std::collections::BTreeMap;

use crate::core::rng::DeterministicRng;
use crate::game::state::{PlayerId, Role};

/// Hard cap on seekers per match.
pub const MAX_SEEKERS: u32 = 3;

/// How many seekers a lobby of `player_count` gets.
pub fn seeker_count(player_count: usize, requested: u32) -> usize {
    if player_count < 2 {
        return player_count.min(1);
    }
    let by_size = (player_count / 4).max(1);
    let cap = requested.clamp(1, MAX_SEEKERS) as usize;
    by_size.min(cap).min(player_count - 1)
}

/// Assign roles by shuffling the lobby with the match RNG.
///
/// Every client holding the same seed and player list derives the same
/// assignment. Input order does not matter.
pub fn assign_roles(
    players: &[PlayerId],
    requested_seekers: u32,
    rng: &mut DeterministicRng,
) -> BTreeMap<PlayerId, Role> {
    let mut order: Vec<PlayerId> = players.to_vec();
    order.sort();
    order.dedup();
    rng.shuffle(&mut order);

    let seekers = seeker_count(order.len(), requested_seekers);
    order
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, if i < seekers { Role::Seeker } else { Role::Hider }))
        .collect()
}
