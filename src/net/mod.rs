//! Network Layer
//!
//! WebSocket broadcast relay for multiplayer channels.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod relay;

pub use relay::{ControlMessage, Relay, RelayError};
