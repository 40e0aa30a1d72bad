//! Core deterministic primitives.
//!
//! Integer-only math, a seeded RNG and state digests. Nothing in here knows
//! about players or arenas.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
