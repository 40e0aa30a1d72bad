//! End-to-end match scenarios and properties, driven through the public API.

use hideout::config::MatchConfig;
use hideout::core::fixed::to_fixed;
use hideout::core::rng::DeterministicRng;
use hideout::core::vec2::FixedVec2;
use hideout::game::arena::{ArenaDefinition, ObstacleKind};
use hideout::game::engine::{Authority, FieldChange, MatchEngine};
use hideout::game::events::{GameEvent, GameEventData};
use hideout::game::motion::{try_step, Direction, MoveCommand, MoveOutcome, RejectReason};
use hideout::game::seeker_ai::AiMode;
use hideout::game::state::{EndReason, MatchMode, MatchPhase, MatchResult, PlayerId, PlayerStatus, Role};
use hideout::sync::coordinator::{Inbound, SyncCoordinator};
use hideout::sync::protocol::{PersistedRow, WireEvent};
use proptest::prelude::*;

const HIDER: PlayerId = PlayerId::new([1; 16]);
const OTHER_HIDER: PlayerId = PlayerId::new([2; 16]);
const SEEKER: PlayerId = PlayerId::new([9; 16]);

fn corner_arena() -> ArenaDefinition {
    ArenaDefinition::new(500.0, 300.0, 450.0, 250.0, 30.0).with_spawn(50.0, 50.0)
}

fn to_seeking(engine: &mut MatchEngine) {
    while engine.phase() == MatchPhase::Hiding {
        engine.clock_tick();
    }
}

fn spotted(events: &[GameEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e.data, GameEventData::HiderSpotted { .. }))
}

fn position(engine: &MatchEngine, id: PlayerId) -> FixedVec2 {
    engine.player(&id).map(|p| p.position).unwrap()
}

/// Walk `id` one cell at a time toward `target` until `done` holds.
fn walk(engine: &mut MatchEngine, id: PlayerId, target: FixedVec2, done: impl Fn(&MatchEngine) -> bool) {
    for _ in 0..100 {
        if done(engine) {
            return;
        }
        engine.submit_move(id, MoveCommand::Toward { target }).unwrap();
    }
    assert!(done(engine), "walk did not finish");
}

#[test]
fn scenario_a_unseen_hider_wins_on_timer() {
    let config = MatchConfig {
        seeking_duration: 5,
        ..MatchConfig::default()
    };
    let mut engine = MatchEngine::single_player("a", &corner_arena(), &config, HIDER, 1).unwrap();
    assert_eq!(position(&engine, HIDER), FixedVec2::from_ints(40, 40));

    let limit = config.hiding_duration + config.seeking_duration + 1;
    let events = hideout::game::tick::run_to_completion(&mut engine, limit, |_, _| {});

    assert!(!spotted(&events));
    assert_eq!(engine.ai_mode(), Some(AiMode::Hunting));
    assert_eq!(engine.result(), MatchResult::HiderWin);
    assert_eq!(engine.outcome().unwrap().end_reason, Some(EndReason::TimerExpired));
    assert_eq!(engine.player(&HIDER).unwrap().status, PlayerStatus::Active);
}

#[test]
fn scenario_b_spotting_at_distance_ten_is_irreversible() {
    let config = MatchConfig {
        hiding_duration: 1,
        seeking_duration: 60,
        vision_radius: 10.0,
        ..MatchConfig::default()
    };
    let mut engine = MatchEngine::single_player("b", &corner_arena(), &config, HIDER, 2).unwrap();
    to_seeking(&mut engine);
    let hider = position(&engine, HIDER);
    let vision = to_fixed(10.0);

    let mut spotted_at = None;
    for _ in 0..2_000 {
        let before = position(&engine, PlayerId::AI_SEEKER);
        let mode_before = engine.ai_mode();
        let result = engine.sim_tick();

        if spotted(&result.events) {
            assert!(spotted_at.is_none(), "spotted twice");
            assert_eq!(mode_before, Some(AiMode::Hunting));
            assert!(before.within(hider, vision));
            spotted_at = Some(engine.tick());
        } else if spotted_at.is_none() {
            assert!(!before.within(hider, vision));
            assert_eq!(engine.ai_mode(), Some(AiMode::Hunting));
        }
        if spotted_at.is_some() {
            assert_eq!(engine.ai_mode(), Some(AiMode::Pursuing));
        }
        if result.match_ended {
            break;
        }
    }

    assert!(spotted_at.is_some());
    assert_eq!(engine.result(), MatchResult::SeekerWin);
    assert_eq!(engine.outcome().unwrap().end_reason, Some(EndReason::SeekerReturned));
}

#[test]
fn scenario_c_one_safe_one_found_is_hider_win() {
    let def = ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0)
        .with_spawn(40.0, 40.0)
        .with_spawn(440.0, 240.0);
    let mut engine =
        MatchEngine::new("c", &def, &MatchConfig::default(), MatchMode::Multiplayer, Authority::Host, 3).unwrap();
    engine.join(SEEKER, Role::Seeker).unwrap();
    engine.join(HIDER, Role::Hider).unwrap();
    engine.join(OTHER_HIDER, Role::Hider).unwrap();

    // Split the hiders into opposite corners while the seeker waits.
    let east = FixedVec2::from_ints(440, 240);
    let west = FixedVec2::from_ints(40, 40);
    walk(&mut engine, HIDER, east, |e| position(e, HIDER) == east);
    walk(&mut engine, OTHER_HIDER, west, |e| position(e, OTHER_HIDER) == west);
    to_seeking(&mut engine);

    walk(&mut engine, SEEKER, west, |e| e.player(&OTHER_HIDER).unwrap().status == PlayerStatus::Found);
    assert_eq!(engine.phase(), MatchPhase::Seeking);

    let den = engine.arena().den_start();
    walk(&mut engine, HIDER, den, |e| e.player(&HIDER).unwrap().status == PlayerStatus::Safe);

    assert_eq!(engine.result(), MatchResult::HiderWin);
    let outcome = engine.outcome().unwrap();
    assert_eq!(outcome.end_reason, Some(EndReason::AllHidersResolved));
    assert_eq!(outcome.leader().map(|p| p.id), Some(HIDER));
    assert!(engine.player(&HIDER).unwrap().reached_den);
}

#[test]
fn scenario_d_move_into_wall_is_silently_rejected() {
    let def = corner_arena().with_obstacle(ObstacleKind::Wall, 60.0, 40.0);
    let mut engine = MatchEngine::single_player("d", &def, &MatchConfig::default(), HIDER, 4).unwrap();
    let start = position(&engine, HIDER);

    let stepped = engine.submit_move(HIDER, MoveCommand::step(Direction::Right)).unwrap();
    assert_eq!(stepped, MoveOutcome::Rejected { reason: RejectReason::Blocked });

    let inside_wall = FixedVec2::from_ints(70, 50);
    let toward = engine.submit_move(HIDER, MoveCommand::Toward { target: inside_wall }).unwrap();
    assert_eq!(toward, MoveOutcome::Rejected { reason: RejectReason::Blocked });

    assert_eq!(position(&engine, HIDER), start);
    assert!(engine.take_outbox().is_empty());
}

#[test]
fn scenario_e_duplicate_found_from_poll_is_silent() {
    let def = ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0).with_spawn(40.0, 40.0);
    let mut engine =
        MatchEngine::new("e", &def, &MatchConfig::default(), MatchMode::Multiplayer, Authority::Local(HIDER), 5)
            .unwrap();
    engine.join(HIDER, Role::Hider).unwrap();
    engine.join(OTHER_HIDER, Role::Hider).unwrap();
    engine.join(SEEKER, Role::Seeker).unwrap();
    to_seeking(&mut engine);
    engine.take_events();

    let mut sync = SyncCoordinator::new(HIDER);
    let changes = sync.ingest(Inbound::Broadcast(WireEvent::found(OTHER_HIDER)));
    assert_eq!(changes, vec![FieldChange::Found { player: OTHER_HIDER }]);
    let first = engine.apply_remote(&changes);
    let found_events = |events: &[GameEvent]| {
        events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::HiderFound { .. }))
            .count()
    };
    assert_eq!(found_events(&first.events), 1);
    let digest = engine.state_digest();

    let mut row = PersistedRow::new(OTHER_HIDER, position(&engine, OTHER_HIDER));
    row.is_found = true;
    let changes = sync.ingest(Inbound::Poll(vec![row]));
    assert!(!changes.iter().any(|c| matches!(c, FieldChange::Found { .. })));

    let second = engine.apply_remote(&changes);
    assert_eq!(found_events(&second.events), 0);
    assert_eq!(engine.state_digest(), digest);

    // Re-applying the raw change directly is also a no-op.
    let third = engine.apply_remote(&[FieldChange::Found { player: OTHER_HIDER }]);
    assert_eq!(found_events(&third.events), 0);
    assert_eq!(engine.state_digest(), digest);
}

fn direction(i: u8) -> Direction {
    match i % 4 {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

proptest! {
    #[test]
    fn prop_moves_into_obstacles_are_rejected(col in 1i32..24, row in 1i32..14, dir in 0u8..4) {
        let (ox, oy) = (col * 20, row * 20);
        // The den start cell must stay free.
        prop_assume!((ox, oy) != (440, 240));
        let arena = ArenaDefinition::new(500.0, 300.0, 450.0, 250.0, 30.0)
            .with_obstacle(ObstacleKind::Wall, ox as f64, oy as f64)
            .with_spawn(0.0, 0.0)
            .build()
            .unwrap();
        let d = direction(dir);
        let from = FixedVec2::from_ints(ox, oy) - d.offset(arena.cell_size());
        prop_assume!(arena.is_free(from));

        let outcome = try_step(&arena, from, MoveCommand::step(d));
        prop_assert_eq!(outcome, MoveOutcome::Rejected { reason: RejectReason::Blocked });
    }

    #[test]
    fn prop_spawn_respects_min_distance(
        points in proptest::collection::vec((0u32..24, 0u32..14), 1..8),
        min in 0u32..400,
        seed in any::<u64>(),
    ) {
        let mut def = ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0);
        for (c, r) in &points {
            def = def.with_spawn(*c as f64 * 20.0, *r as f64 * 20.0);
        }
        let arena = def.build().unwrap();
        let min = to_fixed(min as f64);
        let mut rng = DeterministicRng::new(seed);

        let any_far = arena
            .spawn_points()
            .iter()
            .any(|p| !p.snap(arena.cell_size()).strictly_within(arena.den_center(), min));
        let choice = arena.select_spawn(min, &mut rng);
        prop_assert_eq!(choice.qualified, any_far);
        if any_far {
            prop_assert!(!choice.position.strictly_within(arena.den_center(), min));
        }
    }

    #[test]
    fn prop_status_never_changes_once_resolved(ops in proptest::collection::vec((0u8..2, 0u8..2), 1..20)) {
        let def = ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0).with_spawn(40.0, 40.0);
        let mut engine =
            MatchEngine::new("p", &def, &MatchConfig::default(), MatchMode::Multiplayer, Authority::Host, 7).unwrap();
        engine.join(SEEKER, Role::Seeker).unwrap();
        engine.join(HIDER, Role::Hider).unwrap();
        engine.join(OTHER_HIDER, Role::Hider).unwrap();
        to_seeking(&mut engine);

        let mut first_resolution: Vec<Option<PlayerStatus>> = vec![None, None];
        for (op, who) in ops {
            let player = if who == 0 { HIDER } else { OTHER_HIDER };
            let change = if op == 0 {
                FieldChange::Found { player }
            } else {
                FieldChange::ReachedDen { player }
            };
            engine.apply_remote(&[change]);

            for (slot, id) in first_resolution.iter_mut().zip([HIDER, OTHER_HIDER]) {
                let status = engine.player(&id).unwrap().status;
                match slot {
                    Some(first) => prop_assert_eq!(*first, status),
                    None if status.is_resolved() => *slot = Some(status),
                    None => {}
                }
            }
        }
    }

    #[test]
    fn prop_phase_only_moves_forward(ticks in proptest::collection::vec(any::<bool>(), 1..400)) {
        let config = MatchConfig { hiding_duration: 3, seeking_duration: 6, ..MatchConfig::default() };
        let mut engine = MatchEngine::single_player("p", &corner_arena(), &config, HIDER, 11).unwrap();

        let mut last = engine.phase();
        for clock in ticks {
            if clock {
                engine.clock_tick();
            } else {
                engine.sim_tick();
            }
            let phase = engine.phase();
            prop_assert!(phase >= last);
            prop_assert!(engine.time_remaining() <= config.seeking_duration.max(config.hiding_duration));
            last = phase;
        }
    }

    #[test]
    fn prop_multiplayer_phase_survives_remote_changes_and_leaves(
        ops in proptest::collection::vec((0u8..5, 0u8..3), 1..60),
    ) {
        const THIRD_HIDER: PlayerId = PlayerId::new([3; 16]);
        let hiders = [HIDER, OTHER_HIDER, THIRD_HIDER];
        let config = MatchConfig { hiding_duration: 3, seeking_duration: 6, ..MatchConfig::default() };
        let def = ArenaDefinition::new(500.0, 300.0, 240.0, 140.0, 30.0).with_spawn(40.0, 40.0);
        let mut engine =
            MatchEngine::new("p", &def, &config, MatchMode::Multiplayer, Authority::Local(SEEKER), 7).unwrap();
        engine.join(SEEKER, Role::Seeker).unwrap();
        for id in hiders {
            engine.join(id, Role::Hider).unwrap();
        }

        let mut last = engine.phase();
        let mut resolved: Vec<Option<PlayerStatus>> = vec![None; hiders.len()];
        for (op, who) in ops {
            let player = hiders[who as usize];
            match op {
                0 => { engine.clock_tick(); }
                1 => { engine.apply_remote(&[FieldChange::Found { player }]); }
                2 => { engine.apply_remote(&[FieldChange::ReachedDen { player }]); }
                3 => { let _ = engine.leave(&player); }
                _ => { engine.sim_tick(); }
            }

            let phase = engine.phase();
            let step_ok = phase == last
                || (last == MatchPhase::Hiding && phase == MatchPhase::Seeking)
                || (last == MatchPhase::Seeking && phase == MatchPhase::Ended);
            prop_assert!(step_ok, "illegal transition {:?} -> {:?}", last, phase);
            if phase == MatchPhase::Hiding {
                prop_assert_eq!(engine.result(), MatchResult::None);
            }
            last = phase;

            for (slot, id) in resolved.iter_mut().zip(hiders) {
                let Some(status) = engine.player(&id).map(|p| p.status) else { continue };
                match slot {
                    Some(first) => prop_assert_eq!(*first, status),
                    None if status.is_resolved() => *slot = Some(status),
                    None => {}
                }
            }
        }
    }
}
