//! Hideout Match Server
//!
//! `hideout-server` runs a demo single-seeker match and replays it to check
//! determinism. `hideout-server relay` runs the WebSocket broadcast relay
//! for multiplayer channels.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hideout::{
    VERSION, SIM_TICK_RATE,
    config::{MatchConfig, RuntimeConfig},
    core::{hash::short_hex, rng::derive_match_seed},
    game::{
        arena::{Arena, ArenaDefinition, ObstacleKind},
        engine::{Authority, MatchEngine},
        events::GameEventData,
        motion::MoveCommand,
        state::{MatchMode, MatchPhase, PlayerId, Role},
        tick::run_to_completion,
    },
    net::Relay,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Hideout Server v{}", VERSION);

    let config = RuntimeConfig::load_or_default();
    config.validate().context("invalid runtime configuration")?;
    info!(
        "Sim {} Hz, clock every {:?}, poll every {:?}",
        SIM_TICK_RATE, config.clock_interval, config.poll_interval
    );

    match std::env::args().nth(1).as_deref() {
        Some("relay") => run_relay(&config).await,
        _ => demo_match(&config),
    }
}

async fn run_relay(config: &RuntimeConfig) -> anyhow::Result<()> {
    let relay = Relay::bind(&config.relay_addr, config.broadcast_capacity)
        .await
        .with_context(|| format!("failed to bind relay on {}", config.relay_addr))?;
    let shutdown = relay.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = shutdown.send(());
        }
    });

    relay.run().await?;
    Ok(())
}

/// Built-in arena used when `HIDEOUT_ARENA` is not set.
fn demo_arena() -> ArenaDefinition {
    let mut def = ArenaDefinition::new(500.0, 300.0, 450.0, 250.0, 30.0)
        .with_spawn(40.0, 40.0)
        .with_spawn(60.0, 240.0)
        .with_spawn(300.0, 20.0);
    for y in (60..=180).step_by(20) {
        def = def.with_obstacle(ObstacleKind::Wall, 200.0, y as f64);
    }
    def.with_obstacle(ObstacleKind::Tree, 320.0, 200.0)
        .with_obstacle(ObstacleKind::Building, 380.0, 120.0)
}

fn load_arena(config: &RuntimeConfig) -> anyhow::Result<Arena> {
    match &config.arena_path {
        Some(path) => Arena::from_file(path).with_context(|| format!("failed to load arena {}", path)),
        None => Ok(demo_arena().build()?),
    }
}

/// Run one single-seeker match with a hider that walks toward the den once
/// seeking starts. Returns the final flags digest.
fn play(config: &RuntimeConfig, match_config: &MatchConfig, hider: PlayerId, seed: u64) -> anyhow::Result<[u8; 32]> {
    let arena = load_arena(config)?;
    let mut engine =
        MatchEngine::with_arena("demo", arena, match_config, MatchMode::SingleSeeker, Authority::Host, seed)?;
    engine.join(hider, Role::Hider)?;

    let limit = match_config.hiding_duration + match_config.seeking_duration + 1;
    let events = run_to_completion(&mut engine, limit, |engine, _second| {
        if engine.phase() != MatchPhase::Seeking {
            return;
        }
        let den = engine.arena().den_start();
        for _ in 0..2 {
            let _ = engine.submit_move(hider, MoveCommand::Toward { target: den });
        }
    });

    for event in &events {
        match &event.data {
            GameEventData::HiderSpotted { hider_id, .. } => {
                info!("Tick {}: seeker spotted {}", event.tick, hider_id.short());
            }
            GameEventData::MatchEnded { result, reason } => {
                info!("Tick {}: match ended {:?} ({:?})", event.tick, result, reason);
            }
            _ => {}
        }
    }

    if let Some(outcome) = engine.outcome() {
        for (rank, p) in outcome.per_player.iter().enumerate() {
            info!("#{}: {} {:?} {:?} score {}", rank + 1, p.id.short(), p.role, p.status, p.score);
        }
    }
    info!("{} events, final digest {}", events.len(), short_hex(&engine.state_digest()));
    Ok(engine.state_digest())
}

/// Play the demo match twice and compare digests.
fn demo_match(config: &RuntimeConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ({:?}) ===", config.difficulty);
    let match_config = MatchConfig::preset(config.difficulty);
    let hider = PlayerId::new([7; 16]);
    let seed = derive_match_seed("demo", &[hider.0]);
    info!("RNG Seed: {}", seed);

    let first = play(config, &match_config, hider, seed)?;

    info!("=== Verifying Determinism ===");
    let replay = play(config, &match_config, hider, seed)?;
    if first == replay {
        info!("DETERMINISM VERIFIED: digests match");
    } else {
        anyhow::bail!("determinism failure: {} != {}", short_hex(&first), short_hex(&replay));
    }
    Ok(())
}
