//! Multiplayer Sync Layer
//!
//! Everything that moves state between clients of one match. This layer is
//! **non-deterministic** (wall clocks, network order); all game logic stays
//! in `game/`.
//!
//! - `protocol`: Wire events and persisted rows
//! - `log`: Ordered per-match event log with cursors
//! - `coordinator`: Field-level merge of broadcast, row and poll inputs
//! - `store`: Persisted player-state table and pending writes
//! - `runtime`: The tokio task that drives one client's engine

pub mod protocol;
pub mod log;
pub mod coordinator;
pub mod store;
pub mod runtime;

pub use protocol::{channel_for, PersistedRow, RowPosition, WireEvent};
pub use log::{Accept, EventLog, LogCursor, LogEntry};
pub use coordinator::{CachedPlayer, Inbound, SyncCoordinator};
pub use store::{MemoryStore, PendingWrites, PlayerStore, StoreError};
pub use runtime::{Command, MatchRuntime, RuntimeExit, RuntimeHandle, Snapshot, SyncError};
