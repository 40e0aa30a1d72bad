//! Match Clock
//!
//! Whole-second phase countdown, advanced by the 1 Hz loop.
//!
//! ```text
//!   Hiding(hiding_duration) ──0──► Seeking(seeking_duration) ──0──► Ended
//!                                          │
//!                                          └── end() at any time ──► Ended
//! ```
//!
//! The phase only moves forward and `time_remaining` saturates at zero.

use serde::{Serialize, Deserialize};
use crate::game::state::MatchPhase;

/// What a single clock tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockTick {
    /// Match already over; nothing counted.
    Idle,
    /// One second elapsed, same phase.
    Counting,
    /// Hiding ran out and seeking began.
    SeekingStarted,
    /// Seeking ran out.
    Expired,
}

/// Phase timer for one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchClock {
    phase: MatchPhase,
    time_remaining: u32,
    seeking_duration: u32,
}

impl MatchClock {
    /// Start a clock in the hiding phase.
    pub fn new(hiding_duration: u32, seeking_duration: u32) -> Self {
        Self {
            phase: MatchPhase::Hiding,
            time_remaining: hiding_duration,
            seeking_duration,
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Seconds left in the current phase.
    #[inline]
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// Advance one second.
    pub fn tick(&mut self) -> ClockTick {
        if self.phase == MatchPhase::Ended {
            return ClockTick::Idle;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining > 0 {
            return ClockTick::Counting;
        }

        match self.phase {
            MatchPhase::Hiding => {
                self.phase = MatchPhase::Seeking;
                self.time_remaining = self.seeking_duration;
                ClockTick::SeekingStarted
            }
            _ => {
                self.phase = MatchPhase::Ended;
                ClockTick::Expired
            }
        }
    }

    /// Stop the clock early. Returns the phase that was interrupted, or
    /// `None` if the match had already ended.
    pub fn end(&mut self) -> Option<MatchPhase> {
        if self.phase == MatchPhase::Ended {
            return None;
        }
        let from = self.phase;
        self.phase = MatchPhase::Ended;
        Some(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_full_cycle() {
        let mut clock = MatchClock::new(2, 3);
        assert_eq!(clock.phase(), MatchPhase::Hiding);
        assert_eq!(clock.tick(), ClockTick::Counting);
        assert_eq!(clock.tick(), ClockTick::SeekingStarted);
        assert_eq!(clock.phase(), MatchPhase::Seeking);
        assert_eq!(clock.time_remaining(), 3);
        assert_eq!(clock.tick(), ClockTick::Counting);
        assert_eq!(clock.tick(), ClockTick::Counting);
        assert_eq!(clock.tick(), ClockTick::Expired);
        assert_eq!(clock.phase(), MatchPhase::Ended);
        assert_eq!(clock.time_remaining(), 0);
    }

    #[test]
    fn test_clock_never_negative_or_backwards() {
        let mut clock = MatchClock::new(1, 1);
        let mut last = clock.phase();
        for _ in 0..10 {
            clock.tick();
            assert!(clock.phase() >= last);
            last = clock.phase();
        }
        assert_eq!(clock.tick(), ClockTick::Idle);
        assert_eq!(clock.time_remaining(), 0);
    }

    #[test]
    fn test_clock_end_early() {
        let mut clock = MatchClock::new(10, 10);
        assert_eq!(clock.end(), Some(MatchPhase::Hiding));
        assert_eq!(clock.end(), None);
        assert_eq!(clock.tick(), ClockTick::Idle);
        assert_eq!(clock.time_remaining(), 10);
    }
}
