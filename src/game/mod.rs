//! Game Logic Module
//!
//! Everything that runs inside a match. Deterministic: fixed-point math,
//! seeded RNG, BTreeMap iteration.
//!
//! ## Module Structure
//!
//! - `arena`: Static world, collision boxes, spawn selection
//! - `motion`: One-cell grid moves for human players
//! - `visibility`: Line of sight through opaque obstacles
//! - `seeker_ai`: Hunting/Pursuing controller for the engine-driven seeker
//! - `clock`: Phase countdown
//! - `state`: Players, statuses and the match container
//! - `events`: Ordered game events
//! - `win`: End conditions, scoring, final standings
//! - `roles`: Seeker/hider assignment for lobbies
//! - `engine`: The match engine (commands and queries)
//! - `tick`: Clock and simulation ticks, remote merges

pub mod arena;
pub mod motion;
pub mod visibility;
pub mod seeker_ai;
pub mod clock;
pub mod state;
pub mod events;
pub mod win;
pub mod roles;
pub mod engine;
pub mod tick;

// Re-export key types
pub use arena::{Arena, ArenaDefinition, ArenaError, ObstacleKind};
pub use motion::{Direction, MoveCommand, MoveOutcome, RejectReason};
pub use seeker_ai::{AiMode, Navigation, SeekerAi};
pub use state::{MatchMode, MatchPhase, MatchResult, EndReason, MatchState, Player, PlayerId, PlayerStatus, Role};
pub use engine::{Authority, DenOutcome, EngineError, FieldChange, MatchEngine, TagOutcome};
pub use tick::{TickResult, run_to_completion};
pub use win::{MatchOutcome, PlayerOutcome};
pub use events::{GameEvent, GameEventData};
