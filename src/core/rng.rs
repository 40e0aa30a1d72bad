//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Spawn selection and role
//! assignment draw from this generator, so two engines built with the same
//! seed place every player identically.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use hideout::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(7);
/// let mut b = DeterministicRng::new(7);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Shuffle a slice in place (Fisher-Yates).
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            slice.get(idx)
        }
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from the match id and its players.
///
/// `player_ids` must be sorted by the caller.
pub fn derive_match_seed(match_id: &str, player_ids: &[[u8; 16]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"HIDEOUT_SEED_V1");
    hasher.update((match_id.len() as u32).to_le_bytes());
    hasher.update(match_id.as_bytes());
    for pid in player_ids {
        hasher.update(pid);
    }
    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);
        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_known_values() {
        // Replays depend on this sequence never changing.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);
    }

    #[test]
    fn test_next_int_bounds() {
        let mut rng = DeterministicRng::new(1234);
        for _ in 0..1000 {
            assert!(rng.next_int(7) < 7);
        }
        assert_eq!(rng.next_int(0), 0);
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_choose_covers_all_spawns() {
        let mut rng = DeterministicRng::new(99);
        let spawns = [0usize, 1, 2, 3];
        let mut seen = [false; 4];
        for _ in 0..200 {
            if let Some(&i) = rng.choose(&spawns) {
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
        assert!(rng.choose::<u8>(&[]).is_none());
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);
        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8];
        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);
        assert_eq!(arr1, arr2);
    }

    #[test]
    fn test_derive_match_seed() {
        let players = [[2u8; 16], [3u8; 16]];
        let seed1 = derive_match_seed("game_1", &players);
        let seed2 = derive_match_seed("game_1", &players);
        assert_eq!(seed1, seed2);
        assert_ne!(seed1, derive_match_seed("game_2", &players));
    }
}
