//! Match Ticks
//!
//! The two clocks that drive a match, plus merging of remote changes.
//!
//! - `clock_tick` (1 Hz): phase countdown. Starting the seeking phase runs
//!   the arrival checks once; expiry ends the match in the hiders' favor.
//! - `sim_tick` (20 Hz, seeking only): AI step first, then arrival and tag
//!   checks for the players this engine owns.
//!
//! Both are deterministic: fixed-point math, BTreeMap iteration, no clock
//! reads. Two engines fed the same commands reach the same digest.

use tracing::{debug, info, warn};

use crate::game::clock::ClockTick;
use crate::game::engine::{FieldChange, MatchEngine};
use crate::game::events::GameEvent;
use crate::game::state::{EndReason, MatchMode, MatchPhase, MatchResult, PlayerId};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated since the last drain
    pub events: Vec<GameEvent>,
    /// Whether the match has ended
    pub match_ended: bool,
    /// Result so far
    pub result: MatchResult,
}

impl MatchEngine {
    /// Advance the match clock one second.
    pub fn clock_tick(&mut self) -> TickResult {
        match self.state.clock.tick() {
            ClockTick::Idle | ClockTick::Counting => {}
            ClockTick::SeekingStarted => {
                let event = GameEvent::phase_changed(self.state.tick, MatchPhase::Hiding, MatchPhase::Seeking);
                self.state.push_event(event);
                info!("Match {} seeking started", self.state.match_id);
                if !self.detect_owned_transitions() {
                    // Flags merged or players who left during hiding.
                    self.check_multiplayer_end();
                }
            }
            ClockTick::Expired => {
                let event = GameEvent::phase_changed(self.state.tick, MatchPhase::Seeking, MatchPhase::Ended);
                self.state.push_event(event);
                self.end_match(MatchResult::HiderWin, EndReason::TimerExpired);
            }
        }
        self.tick_result()
    }

    /// Run one simulation step. Does nothing outside the seeking phase.
    pub fn sim_tick(&mut self) -> TickResult {
        if self.state.phase() == MatchPhase::Seeking {
            self.state.tick += 1;
            if self.ai.is_some() {
                self.step_ai();
            }
            if !self.state.is_ended() {
                self.detect_owned_transitions();
            }
        }
        self.tick_result()
    }

    /// Apply changes merged from the network.
    ///
    /// Positions of players this engine owns are skipped (they are always
    /// sourced locally), as are positions that would overlap an obstacle.
    /// `Found` and `ReachedDen` go through the same monotonic setters as
    /// local commands, so repeats are no-ops.
    ///
    /// Remote tags are not range-checked: a client claiming a tag is
    /// believed. Only local `report_tag` validates range and phase.
    ///
    /// A peer whose clock runs ahead can send flags while this engine is
    /// still hiding. They are merged, but the match is only evaluated once
    /// seeking starts here.
    pub fn apply_remote(&mut self, changes: &[FieldChange]) -> TickResult {
        let mut resolved = false;

        for change in changes {
            match *change {
                FieldChange::Position { player, position } => {
                    if self.authority.owns_player(&player) {
                        debug!("Ignoring remote position for owned player {}", player.short());
                        continue;
                    }
                    if !self.arena.is_free(position) {
                        warn!("Dropping remote position {} for {}: not a free cell", position, player.short());
                        continue;
                    }
                    let current = self.state.get_player(&player).map(|p| p.position);
                    if current.is_some_and(|c| c != position) {
                        self.set_position(player, position);
                    }
                }
                FieldChange::Found { player } => {
                    resolved |= self.state.mark_found(&player, None);
                }
                FieldChange::ReachedDen { player } => {
                    resolved |= self.state.mark_safe(&player);
                }
            }
        }

        // A remote hider may have walked into an owned seeker's reach.
        resolved |= self.detect_owned_transitions();
        if resolved {
            self.check_multiplayer_end();
        }
        self.tick_result()
    }

    fn tick_result(&mut self) -> TickResult {
        TickResult {
            events: self.state.take_events(),
            match_ended: self.state.is_ended(),
            result: self.state.result,
        }
    }

    fn step_ai(&mut self) {
        let Some(seeker) = self.state.get_player(&PlayerId::AI_SEEKER).map(|p| p.position) else {
            return;
        };
        let target = self
            .state
            .hiders()
            .find(|h| h.is_active())
            .map(|h| (h.id, h.position));

        let Some(ai) = self.ai.as_mut() else {
            return;
        };
        let step = ai.step(&self.arena, &self.params.ai, seeker, target.map(|(_, pos)| pos));
        let stuck_ticks = ai.stuck_ticks();

        if step.spotted {
            if let Some((hider, _)) = target {
                info!("Seeker spotted hider {} at tick {}", hider.short(), self.state.tick);
                let event = GameEvent::hider_spotted(self.state.tick, PlayerId::AI_SEEKER, hider);
                self.state.push_event(event);
            }
        }

        if step.reached_den {
            if let Some((hider, _)) = target {
                self.tag(PlayerId::AI_SEEKER, hider);
            }
            self.end_match(MatchResult::SeekerWin, EndReason::SeekerReturned);
            return;
        }

        if step.moved {
            self.set_position(PlayerId::AI_SEEKER, step.position);
        } else if stuck_ticks == 1 {
            debug!("Seeker stuck at {}", seeker);
        }
    }

    /// Arrival and tag checks for the players this engine owns. Returns
    /// whether any status changed.
    pub(crate) fn detect_owned_transitions(&mut self) -> bool {
        if self.state.phase() != MatchPhase::Seeking {
            return false;
        }
        let den_radius = self.params.den_radius;

        if self.state.mode == MatchMode::SingleSeeker {
            let arrived = self
                .state
                .hiders()
                .find(|h| h.is_active() && self.arena.is_at_den(h.position, den_radius))
                .map(|h| h.id);
            return match arrived {
                Some(hider) => {
                    self.resolve_den_race(hider);
                    true
                }
                None => false,
            };
        }

        let authority = self.authority;
        let arrivals: Vec<PlayerId> = self
            .state
            .hiders()
            .filter(|h| h.is_active() && authority.owns_player(&h.id))
            .filter(|h| self.arena.is_at_den(h.position, den_radius))
            .map(|h| h.id)
            .collect();

        let mut changed = false;
        for hider in arrivals {
            changed |= self.reach_den(hider);
        }

        let tag_radius = self.params.tag_radius;
        let tags: Vec<(PlayerId, PlayerId)> = self
            .state
            .seekers()
            .filter(|s| authority.owns_player(&s.id))
            .flat_map(|s| {
                self.state
                    .hiders()
                    .filter(move |h| h.is_active() && s.position.strictly_within(h.position, tag_radius))
                    .map(move |h| (s.id, h.id))
            })
            .collect();
        for (seeker, hider) in tags {
            changed |= self.tag(seeker, hider);
        }

        if changed {
            self.check_multiplayer_end();
        }
        changed
    }
}

/// Drive a match in lockstep: per second, call `on_second`, run one
/// second of simulation ticks, then advance the clock. Returns every event.
pub fn run_to_completion<F>(engine: &mut MatchEngine, max_seconds: u32, mut on_second: F) -> Vec<GameEvent>
where
    F: FnMut(&mut MatchEngine, u32),
{
    let mut events = Vec::new();
    for second in 0..max_seconds {
        if engine.phase() == MatchPhase::Ended {
            break;
        }
        on_second(engine, second);
        for _ in 0..crate::SIM_TICK_RATE {
            let result = engine.sim_tick();
            events.extend(result.events);
            if result.match_ended {
                break;
            }
        }
        let result = engine.clock_tick();
        events.extend(result.events);
        if result.match_ended {
            break;
        }
    }
    events
}
