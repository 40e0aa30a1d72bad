//! Match Runtime
//!
//! Drives one client's [`MatchEngine`] from a single tokio task. Every
//! independent loop is an arm of one `select!`, so the engine has exactly
//! one writer and never needs a lock.
//!
//! ```text
//!   clock 1 Hz ─────┐
//!   sim 20 Hz ──────┤
//!   poll 2 s ───────┤            ┌─► watch<Snapshot>
//!   throttle 200 ms ┼─► engine ──┼─► broadcast<GameEvent>
//!   retry ──────────┤            └─► outbox ─► event log (broadcast) + store (persist)
//!   commands (mpsc)─┤
//!   event log ──────┤  (cursor, backfill on gap/lag)
//!   store rows ─────┤
//!   shutdown ───────┘
//! ```
//!
//! Broadcasts and persistence never block the loop. A failed persist is
//! logged and parked in [`PendingWrites`] until the next retry or poll.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::RuntimeConfig;
use crate::core::hash::StateHash;
use crate::core::vec2::FixedVec2;
use crate::game::engine::{DenOutcome, EngineError, FieldChange, MatchEngine, TagOutcome};
use crate::game::events::GameEvent;
use crate::game::motion::{MoveCommand, MoveOutcome};
use crate::game::state::{MatchPhase, MatchResult, Player, PlayerId};
use crate::game::win::MatchOutcome;
use crate::sync::coordinator::{Inbound, SyncCoordinator};
use crate::sync::log::{Accept, EventLog, LogCursor, LogEntry};
use crate::sync::protocol::{PersistedRow, WireEvent};
use crate::sync::store::{PendingWrites, PlayerStore, RowNotice, StoreError};

/// Runtime errors seen by a [`RuntimeHandle`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Engine refused the command
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    /// Store failure
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Runtime task has stopped
    #[error("match runtime closed")]
    Closed,
}

/// Commands accepted by the runtime.
#[derive(Debug)]
pub enum Command {
    /// Move the local player
    Move {
        /// Step or target
        command: MoveCommand,
        /// Outcome
        reply: oneshot::Sender<Result<MoveOutcome, EngineError>>,
    },
    /// Local seeker tags a hider
    Tag {
        /// Hider
        target: PlayerId,
        /// Outcome
        reply: oneshot::Sender<Result<TagOutcome, EngineError>>,
    },
    /// Local hider claims the den
    ReportDen {
        /// Outcome
        reply: oneshot::Sender<Result<DenOutcome, EngineError>>,
    },
    /// Leave the match and stop
    Leave,
}

/// Read-only view published after every loop iteration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Current phase
    pub phase: MatchPhase,
    /// Seconds left in the phase
    pub time_remaining: u32,
    /// Result so far
    pub result: MatchResult,
    /// Every player, id order
    pub players: Vec<Player>,
    /// Engine flags digest
    pub digest: StateHash,
    /// Coordinator cache digest
    pub sync_digest: StateHash,
    /// Simulation ticks run
    pub tick: u32,
    /// Final standings once ended
    pub outcome: Option<MatchOutcome>,
}

impl Snapshot {
    fn of(engine: &MatchEngine, sync: &SyncCoordinator) -> Self {
        Self {
            phase: engine.phase(),
            time_remaining: engine.time_remaining(),
            result: engine.result(),
            players: engine.player_states().cloned().collect(),
            digest: engine.state_digest(),
            sync_digest: sync.digest(),
            tick: engine.tick(),
            outcome: engine.outcome(),
        }
    }

    /// One player's state.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }
}

/// What the runtime task returns when it stops.
#[derive(Debug, Clone)]
pub struct RuntimeExit {
    /// Standings if the match had ended before the local player left
    pub outcome: Option<MatchOutcome>,
    /// Writes that were never persisted
    pub pending_writes: usize,
    /// Last applied log sequence number
    pub log_position: u64,
}

/// Client-side handle to a running match.
#[derive(Clone)]
pub struct RuntimeHandle {
    local_id: PlayerId,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    events: broadcast::Sender<GameEvent>,
    shutdown: broadcast::Sender<()>,
}

impl RuntimeHandle {
    /// Player this runtime acts for.
    pub fn local_id(&self) -> PlayerId {
        self.local_id
    }

    /// Move the local player.
    pub async fn submit_move(&self, command: MoveCommand) -> Result<MoveOutcome, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Move { command, reply }).await?;
        Ok(rx.await.map_err(|_| SyncError::Closed)??)
    }

    /// Tag `target` as the local seeker.
    pub async fn report_tag(&self, target: PlayerId) -> Result<TagOutcome, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Tag { target, reply }).await?;
        Ok(rx.await.map_err(|_| SyncError::Closed)??)
    }

    /// Claim the den as the local hider.
    pub async fn report_den(&self) -> Result<DenOutcome, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReportDen { reply }).await?;
        Ok(rx.await.map_err(|_| SyncError::Closed)??)
    }

    /// Leave the match. The runtime removes the local player and stops.
    pub async fn leave(&self) -> Result<(), SyncError> {
        self.send(Command::Leave).await
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch snapshots as they are published.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Game events in emission order.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Stop the runtime without a leave command.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands.send(command).await.map_err(|_| SyncError::Closed)
    }
}

/// Loop state owned by the runtime task.
pub struct MatchRuntime {
    engine: MatchEngine,
    local_id: PlayerId,
    sync: SyncCoordinator,
    cursor: LogCursor,
    log: EventLog,
    store: Arc<dyn PlayerStore>,
    pending: PendingWrites,
    unsent_positions: BTreeMap<PlayerId, FixedVec2>,
    snapshots: watch::Sender<Snapshot>,
    events: broadcast::Sender<GameEvent>,
}

/// Receivers and timers the loop selects over.
struct Inputs {
    commands: mpsc::Receiver<Command>,
    log_rx: broadcast::Receiver<LogEntry>,
    store_rx: broadcast::Receiver<RowNotice>,
    shutdown_rx: broadcast::Receiver<()>,
    config: RuntimeConfig,
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl MatchRuntime {
    /// Start driving `engine` for `local_id`. Subscriptions to the log and
    /// the store are taken before the task starts, so nothing published
    /// after this call is missed.
    pub fn spawn(
        engine: MatchEngine,
        local_id: PlayerId,
        log: EventLog,
        store: Arc<dyn PlayerStore>,
        config: &RuntimeConfig,
    ) -> (RuntimeHandle, JoinHandle<RuntimeExit>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (events_tx, _) = broadcast::channel(config.broadcast_capacity);

        let sync = SyncCoordinator::new(local_id);
        let (snap_tx, snap_rx) = watch::channel(Snapshot::of(&engine, &sync));

        let inputs = Inputs {
            commands: cmd_rx,
            log_rx: log.subscribe(),
            store_rx: store.subscribe(),
            shutdown_rx,
            config: config.clone(),
        };

        let runtime = MatchRuntime {
            engine,
            local_id,
            sync,
            cursor: LogCursor::new(),
            log,
            store,
            pending: PendingWrites::new(),
            unsent_positions: BTreeMap::new(),
            snapshots: snap_tx,
            events: events_tx.clone(),
        };

        let task = tokio::spawn(runtime.run(inputs));
        let handle = RuntimeHandle {
            local_id,
            commands: cmd_tx,
            snapshots: snap_rx,
            events: events_tx,
            shutdown: shutdown_tx,
        };
        (handle, task)
    }

    async fn run(mut self, mut inputs: Inputs) -> RuntimeExit {
        info!("Runtime for {} started in match {}", self.local_id.short(), self.engine.match_id());
        self.announce();
        self.backfill().await;
        self.publish();

        let mut clock = ticker(inputs.config.clock_interval);
        let mut sim = ticker(inputs.config.sim_interval);
        let mut poll = ticker(inputs.config.poll_interval);
        let mut throttle = ticker(inputs.config.position_throttle);
        let mut retry = ticker(inputs.config.retry_interval);

        loop {
            tokio::select! {
                _ = clock.tick() => {
                    let result = self.engine.clock_tick();
                    self.emit(result.events);
                }
                _ = sim.tick() => {
                    let result = self.engine.sim_tick();
                    self.emit(result.events);
                }
                _ = poll.tick() => {
                    self.poll();
                }
                _ = throttle.tick() => {
                    self.flush_positions().await;
                }
                _ = retry.tick() => {
                    if !self.pending.is_empty() {
                        self.pending.retry(self.store.as_ref());
                    }
                }
                cmd = inputs.commands.recv() => match cmd {
                    Some(Command::Leave) | None => {
                        info!("Player {} leaving match {}", self.local_id.short(), self.engine.match_id());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                },
                entry = inputs.log_rx.recv() => match entry {
                    Ok(entry) => match self.cursor.accept(entry) {
                        Accept::Next(entry) => self.ingest(Inbound::Logged(entry)),
                        Accept::Stale => {}
                        Accept::Gap => self.backfill().await,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Log receiver lagged by {}; backfilling", skipped);
                        self.backfill().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Event log closed");
                        break;
                    }
                },
                notice = inputs.store_rx.recv() => match notice {
                    Ok(RowNotice::Upsert(row)) => self.ingest(Inbound::RowChange(row)),
                    Ok(RowNotice::Removed(player)) => self.ingest(Inbound::RowRemoved(player)),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Store notifications lagged by {}; polling", skipped);
                        self.poll();
                    }
                    Err(RecvError::Closed) => {
                        warn!("Store notifications closed");
                        break;
                    }
                },
                _ = inputs.shutdown_rx.recv() => {
                    info!("Runtime for {} shutting down", self.local_id.short());
                    break;
                }
            }

            self.dispatch_outbox().await;
            self.publish();
        }

        // Dropping `inputs` releases the log, store and command channels.
        drop(inputs);
        self.exit().await
    }

    fn announce(&mut self) {
        let Some(player) = self.engine.player(&self.local_id) else {
            return;
        };
        let row = PersistedRow::from_player(player);
        if let Err(e) = self.store.insert_row(row) {
            warn!("Failed to insert row for {}: {}", self.local_id.short(), e);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let local = self.local_id;
        match cmd {
            Command::Move { command, reply } => {
                let _ = reply.send(self.engine.submit_move(local, command));
            }
            Command::Tag { target, reply } => {
                let _ = reply.send(self.engine.report_tag(local, target));
            }
            Command::ReportDen { reply } => {
                let _ = reply.send(self.engine.report_den_arrival(local));
            }
            Command::Leave => {}
        }
    }

    fn ingest(&mut self, inbound: Inbound) {
        let changes = self.sync.ingest(inbound);
        if !changes.is_empty() {
            trace!("Applying {} remote change(s)", changes.len());
            let result = self.engine.apply_remote(&changes);
            self.emit(result.events);
        }

        for player in self.sync.take_departures() {
            match self.engine.leave(&player) {
                Ok(()) => info!("Dropped departed player {}", player.short()),
                Err(e) => debug!("Departure of {} not applied: {}", player.short(), e),
            }
        }
    }

    async fn backfill(&mut self) {
        let missed = self.log.since(self.cursor.position()).await;
        for entry in self.cursor.backfill(&missed) {
            self.ingest(Inbound::Logged(entry));
        }
    }

    fn poll(&mut self) {
        if !self.pending.is_empty() {
            self.pending.retry(self.store.as_ref());
        }
        match self.store.fetch_all() {
            Ok(rows) => self.ingest(Inbound::Poll(rows)),
            Err(e) => warn!("Poll failed: {}", e),
        }
    }

    async fn dispatch_outbox(&mut self) {
        for change in self.engine.take_outbox() {
            self.sync.note_local(&change);
            match change {
                FieldChange::Position { player, position } => {
                    self.unsent_positions.insert(player, position);
                }
                FieldChange::Found { .. } | FieldChange::ReachedDen { .. } => {
                    self.log.append(WireEvent::from_change(&change)).await;
                    self.persist(change);
                }
            }
        }
    }

    async fn flush_positions(&mut self) {
        for (player, position) in std::mem::take(&mut self.unsent_positions) {
            self.log.append(WireEvent::position(player, position)).await;
            self.persist(FieldChange::Position { player, position });
        }
    }

    fn persist(&mut self, change: FieldChange) {
        if let Err(e) = self.store.write_change(&change) {
            warn!("Persist of {:?} failed: {}", change, e);
            self.pending.push(change);
        }
    }

    fn emit(&mut self, events: Vec<GameEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn publish(&mut self) {
        let events = self.engine.take_events();
        self.emit(events);
        self.snapshots.send_replace(Snapshot::of(&self.engine, &self.sync));
    }

    async fn exit(mut self) -> RuntimeExit {
        self.flush_positions().await;
        if !self.pending.is_empty() {
            self.pending.retry(self.store.as_ref());
        }

        let outcome = self.engine.outcome();
        let local = self.local_id;
        if let Err(e) = self.engine.leave(&local) {
            debug!("Local player already gone: {}", e);
        }
        if let Err(e) = self.store.remove_row(&local) {
            warn!("Failed to remove row for {}: {}", local.short(), e);
        }
        self.sync.forget(&local);
        self.publish();

        if !self.pending.is_empty() {
            warn!("{} write(s) were never persisted", self.pending.len());
        }
        RuntimeExit {
            outcome,
            pending_writes: self.pending.len(),
            log_position: self.cursor.position(),
        }
    }
}
