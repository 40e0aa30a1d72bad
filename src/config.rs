//! Configuration
//!
//! Two layers:
//!
//! - [`MatchConfig`]: gameplay tuning, serde/camelCase so lobby settings can
//!   be passed around as JSON. Floats here are converted to fixed point
//!   exactly once, in [`MatchConfig::sim_params`].
//! - [`RuntimeConfig`]: loop rates, channel sizes and addresses for the
//!   server process, read from `HIDEOUT_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::fixed::{Fixed, MAX_WORLD_VALUE, from_float};
use crate::game::seeker_ai::{AiParams, Navigation};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON did not parse
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field is out of range
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

/// Preset bundles of match tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Standard settings
    #[default]
    Classic,
    /// Slower, shorter-sighted seeker
    Easy,
    /// Faster seeker that searches around obstacles
    Hard,
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Difficulty::Classic),
            "easy" => Ok(Difficulty::Easy),
            "hard" => Ok(Difficulty::Hard),
            other => Err(invalid("difficulty", format!("unknown preset '{}'", other))),
        }
    }
}

// =============================================================================
// MATCH CONFIG
// =============================================================================

/// Gameplay tuning for one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchConfig {
    /// Seconds of hiding before seekers are released
    pub hiding_duration: u32,
    /// Seconds of seeking before hiders win on time
    pub seeking_duration: u32,
    /// AI detection radius
    #[serde(rename = "seekerVisionRadius")]
    pub vision_radius: f64,
    /// Minimum spawn distance from the den center
    pub min_spawn_distance: f64,
    /// Den radius override; `None` uses the arena's own radius
    pub den_radius: Option<f64>,
    /// AI base step per simulation tick
    pub seeker_speed: f64,
    /// Tag reach (strict)
    pub tag_radius: f64,
    /// Pursuit speed factor
    pub pursuit_multiplier: f64,
    /// AI obstacle avoidance
    pub navigation: Navigation,
    /// Requested seekers in multiplayer lobbies (capped at 3)
    pub seeker_count: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::preset(Difficulty::Classic)
    }
}

impl MatchConfig {
    /// Tuning for a difficulty preset.
    pub fn preset(difficulty: Difficulty) -> Self {
        let base = Self {
            hiding_duration: 10,
            seeking_duration: 180,
            vision_radius: 80.0,
            min_spawn_distance: 150.0,
            den_radius: Some(30.0),
            seeker_speed: 2.0,
            tag_radius: 25.0,
            pursuit_multiplier: 2.5,
            navigation: Navigation::Greedy,
            seeker_count: 2,
        };
        match difficulty {
            Difficulty::Classic => base,
            Difficulty::Easy => Self {
                hiding_duration: 15,
                seeking_duration: 240,
                vision_radius: 60.0,
                min_spawn_distance: 200.0,
                den_radius: Some(35.0),
                seeker_speed: 1.5,
                ..base
            },
            Difficulty::Hard => Self {
                hiding_duration: 8,
                seeking_duration: 120,
                vision_radius: 100.0,
                min_spawn_distance: 120.0,
                den_radius: Some(25.0),
                seeker_speed: 3.0,
                navigation: Navigation::GridSearch { node_budget: 400 },
                ..base
            },
        }
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hiding_duration == 0 {
            return Err(invalid("hidingDuration", "must be at least 1 second"));
        }
        if self.seeking_duration == 0 {
            return Err(invalid("seekingDuration", "must be at least 1 second"));
        }
        positive("seekerVisionRadius", self.vision_radius)?;
        positive("seekerSpeed", self.seeker_speed)?;
        positive("tagRadius", self.tag_radius)?;
        if let Some(r) = self.den_radius {
            positive("denRadius", r)?;
        }
        if !self.min_spawn_distance.is_finite()
            || self.min_spawn_distance < 0.0
            || self.min_spawn_distance > MAX_WORLD_VALUE
        {
            return Err(invalid("minSpawnDistance", "must be finite and non-negative"));
        }
        if !self.pursuit_multiplier.is_finite() || !(1.0..=10.0).contains(&self.pursuit_multiplier) {
            return Err(invalid("pursuitMultiplier", "must be between 1 and 10"));
        }
        if self.seeker_count == 0 {
            return Err(invalid("seekerCount", "must be at least 1"));
        }
        Ok(())
    }

    /// Fixed-point parameters for the simulation. `arena_den_radius` is
    /// used when no override is configured.
    pub fn sim_params(&self, arena_den_radius: Fixed) -> SimParams {
        let den_radius = self.den_radius.map(from_float).unwrap_or(arena_den_radius);
        let vision_radius = from_float(self.vision_radius);
        SimParams {
            hiding_duration: self.hiding_duration,
            seeking_duration: self.seeking_duration,
            min_spawn_distance: from_float(self.min_spawn_distance),
            tag_radius: from_float(self.tag_radius),
            vision_radius,
            den_radius,
            seeker_count: self.seeker_count,
            ai: AiParams {
                speed: from_float(self.seeker_speed),
                pursuit_multiplier: from_float(self.pursuit_multiplier),
                vision_radius,
                den_radius,
                navigation: self.navigation,
            },
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= MAX_WORLD_VALUE {
        Ok(())
    } else {
        Err(invalid(field, format!("must be in (0, {}], got {}", MAX_WORLD_VALUE, value)))
    }
}

/// [`MatchConfig`] converted to fixed point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimParams {
    /// Hiding seconds
    pub hiding_duration: u32,
    /// Seeking seconds
    pub seeking_duration: u32,
    /// Spawn distance floor
    pub min_spawn_distance: Fixed,
    /// Tag reach
    pub tag_radius: Fixed,
    /// Vision radius (AI detection and hider awareness)
    pub vision_radius: Fixed,
    /// Effective den radius
    pub den_radius: Fixed,
    /// Requested seekers
    pub seeker_count: u32,
    /// AI tuning
    pub ai: AiParams,
}

// =============================================================================
// RUNTIME CONFIG
// =============================================================================

/// Server process configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Match clock period
    pub clock_interval: Duration,
    /// Simulation tick period
    pub sim_interval: Duration,
    /// Full-list poll period
    pub poll_interval: Duration,
    /// Minimum gap between position broadcasts
    pub position_throttle: Duration,
    /// Pending-write retry period
    pub retry_interval: Duration,
    /// Command channel capacity
    pub command_capacity: usize,
    /// Broadcast/event-log channel capacity
    pub broadcast_capacity: usize,
    /// WebSocket relay bind address
    pub relay_addr: String,
    /// Arena definition file; `None` uses the built-in demo arena
    pub arena_path: Option<String>,
    /// Preset used by the demo match
    pub difficulty: Difficulty,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            clock_interval: Duration::from_secs(1),
            sim_interval: Duration::from_millis(50),
            poll_interval: Duration::from_secs(2),
            position_throttle: Duration::from_millis(200),
            retry_interval: Duration::from_secs(1),
            command_capacity: 64,
            broadcast_capacity: 256,
            relay_addr: "0.0.0.0:8787".to_string(),
            arena_path: None,
            difficulty: Difficulty::Classic,
        }
    }
}

fn env_millis(key: &str, target: &mut Duration) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => *target = Duration::from_millis(ms),
            Ok(_) => tracing::warn!("{} must be > 0, using default", key),
            Err(_) => tracing::warn!("Invalid {} '{}', using default", key, raw),
        }
    }
}

fn env_capacity(key: &str, target: &mut usize) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<usize>() {
            Ok(n) if (1..=65_536).contains(&n) => *target = n,
            Ok(_) => tracing::warn!("{} must be 1-65536, using default", key),
            Err(_) => tracing::warn!("Invalid {} '{}', using default", key, raw),
        }
    }
}

impl RuntimeConfig {
    /// Load config from environment or use defaults.
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_millis("HIDEOUT_CLOCK_MS", &mut config.clock_interval);
        env_millis("HIDEOUT_SIM_MS", &mut config.sim_interval);
        env_millis("HIDEOUT_POLL_MS", &mut config.poll_interval);
        env_millis("HIDEOUT_POSITION_THROTTLE_MS", &mut config.position_throttle);
        env_millis("HIDEOUT_RETRY_MS", &mut config.retry_interval);
        env_capacity("HIDEOUT_COMMAND_CAPACITY", &mut config.command_capacity);
        env_capacity("HIDEOUT_BROADCAST_CAPACITY", &mut config.broadcast_capacity);

        if let Ok(addr) = std::env::var("HIDEOUT_RELAY_ADDR") {
            if addr.parse::<std::net::SocketAddr>().is_ok() {
                config.relay_addr = addr;
            } else {
                tracing::warn!("Invalid HIDEOUT_RELAY_ADDR '{}', using default", addr);
            }
        }

        if let Ok(path) = std::env::var("HIDEOUT_ARENA") {
            config.arena_path = Some(path);
        }

        if let Ok(raw) = std::env::var("HIDEOUT_DIFFICULTY") {
            match raw.parse() {
                Ok(d) => config.difficulty = d,
                Err(_) => tracing::warn!("Invalid HIDEOUT_DIFFICULTY '{}', using default", raw),
            }
        }

        config
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_interval > self.clock_interval {
            return Err(invalid("sim_interval", "must not exceed the clock interval"));
        }
        if self.command_capacity == 0 || self.broadcast_capacity == 0 {
            return Err(invalid("capacity", "channel capacities must be at least 1"));
        }
        if self.relay_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid("relay_addr", format!("'{}' is not a socket address", self.relay_addr)));
        }
        Ok(())
    }
}
