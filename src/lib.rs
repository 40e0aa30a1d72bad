//! # Hideout Match Server
//!
//! Real-time hide-and-seek on a 2D grid arena: hiders scatter, seekers
//! hunt, and a hider who reaches the den untagged is safe. Runs either as
//! one human hider against an engine-driven seeker, or as an N-player
//! match kept in sync over a broadcast channel and a persisted row table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HIDEOUT SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State digests for divergence checks       │
//! │                                                              │
//! │  game/           - Match logic (deterministic)               │
//! │  ├── arena.rs    - Obstacles, den, spawn points              │
//! │  ├── motion.rs   - Grid moves and collision                  │
//! │  ├── visibility.rs - Line of sight                           │
//! │  ├── seeker_ai.rs  - Hunting/Pursuing seeker                 │
//! │  ├── engine.rs   - Commands, queries, authority              │
//! │  ├── tick.rs     - Clock and simulation ticks                │
//! │  └── win.rs      - End conditions and scoring                │
//! │                                                              │
//! │  sync/           - Multiplayer state sync (non-deterministic)│
//! │  ├── log.rs      - Ordered event log and cursors             │
//! │  ├── coordinator.rs - Field-level merge                      │
//! │  ├── store.rs    - Persisted rows, pending writes            │
//! │  └── runtime.rs  - tokio task driving one client             │
//! │                                                              │
//! │  net/            - WebSocket broadcast relay                 │
//! │  config.rs       - Match presets and runtime settings        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - No floating-point arithmetic once an arena is built
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+
//!
//! Two engines given the same arena, seed and commands reach the same
//! state digest.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod sync;
pub mod net;
pub mod config;

// Re-export commonly used types
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::vec2::FixedVec2;
pub use core::rng::DeterministicRng;
pub use config::{Difficulty, MatchConfig, RuntimeConfig};
pub use game::engine::{Authority, EngineError, MatchEngine};
pub use game::state::{MatchPhase, MatchResult, PlayerId, Role};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const SIM_TICK_RATE: u32 = 20;

/// Match clock rate (Hz)
pub const CLOCK_RATE: u32 = 1;
