/// One player's side of a duel: local engine, snapshot sync and room lifecycle
use std::sync::Arc;

use tokio::time::Instant;
use zenoh_duel::{
    Inbound, PlayerId, RoomId, RoomState, RoomStatus, RoomStore, SyncChannel, SyncConfig, SyncStats,
    Transport,
};

use crate::codec::SyncSnapshot;
use crate::engine::{Action, FinalReport, MatchConfig, MatchEngine, MatchEvent};
use crate::opponent::OpponentView;

/// Commands that can be sent to a running session
#[derive(Debug, Clone)]
pub enum MatchCommand {
    /// Player input for the local engine
    Input(Action),
    /// Leave the session without finalizing the room
    Stop,
}

/// Result of the match as recorded by the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub room: RoomId,
    pub winner: Option<PlayerId>,
    pub report: FinalReport,
    pub opponent_score: Option<u64>,
}

/// Result of one [`MatchSession::step`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The guest arrived, the local match is running
    Started,
    /// Local or opponent state changed, worth a redraw
    Updated,
    /// Nothing visible happened within the step timeout
    Timeout,
    /// The match is over and the room finalized
    GameOver(MatchOutcome),
    /// The session stopped
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingForGuest,
    Playing,
    Finished,
}

/// Decide the winner from both final scores
///
/// Without an opponent or its score there is no winner, and a tie has none
/// either.
pub fn resolve_winner(
    me: &PlayerId,
    my_score: u64,
    opponent: Option<&PlayerId>,
    opponent_score: Option<u64>,
) -> Option<PlayerId> {
    let (opponent, opponent_score) = (opponent?, opponent_score?);
    match my_score.cmp(&opponent_score) {
        std::cmp::Ordering::Greater => Some(me.clone()),
        std::cmp::Ordering::Less => Some(opponent.clone()),
        std::cmp::Ordering::Equal => None,
    }
}

/// A player's duel session
///
/// All mutation happens inside [`MatchSession::step`], which waits on gravity,
/// timers, the outbound throttle, inbound snapshots, room changes and local
/// commands, and handles whichever comes first.
pub struct MatchSession {
    me: PlayerId,
    room: RoomState,
    config: SyncConfig,
    store: Arc<dyn RoomStore>,
    channel: SyncChannel<SyncSnapshot>,
    engine: MatchEngine,
    opponent: OpponentView,
    room_rx: flume::Receiver<RoomState>,
    command_tx: flume::Sender<MatchCommand>,
    command_rx: flume::Receiver<MatchCommand>,
    phase: Phase,
    epoch: Option<Instant>,
}

impl std::fmt::Debug for MatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSession")
            .field("me", &self.me)
            .field("room", &self.room.id)
            .field("phase", &self.phase)
            .field("engine", &self.engine)
            .finish()
    }
}

impl MatchSession {
    /// Create a room and wait for a guest; the match starts once one joins
    pub async fn host(
        me: PlayerId,
        store: Arc<dyn RoomStore>,
        transport: Arc<dyn Transport>,
        config: SyncConfig,
        match_config: MatchConfig,
    ) -> zenoh_duel::Result<Self> {
        let room = store.create_room(&me).await?;
        let room_rx = store.watch(&room.id).await?;
        let channel = SyncChannel::open(transport, room.id.clone(), me.clone(), &config).await?;
        tracing::info!("Player '{}' hosting room '{}'", me, room.id);
        Ok(Self::new(me, room, config, store, channel, match_config, room_rx))
    }

    /// Join a waiting room and start playing immediately
    pub async fn join(
        me: PlayerId,
        room: &RoomId,
        store: Arc<dyn RoomStore>,
        transport: Arc<dyn Transport>,
        config: SyncConfig,
        match_config: MatchConfig,
    ) -> zenoh_duel::Result<Self> {
        // Subscribe first so that no snapshot of the host is missed
        let mut channel = SyncChannel::open(transport, room.clone(), me.clone(), &config).await?;
        let room_rx = store.watch(room).await?;
        let state = store.join_room(room, &me).await?;
        channel.set_peer(state.host.clone());
        tracing::info!("Player '{}' joined room '{}' hosted by '{}'", me, room, state.host);

        let mut session = Self::new(me, state, config, store, channel, match_config, room_rx);
        session.start();
        Ok(session)
    }

    fn new(
        me: PlayerId,
        room: RoomState,
        config: SyncConfig,
        store: Arc<dyn RoomStore>,
        channel: SyncChannel<SyncSnapshot>,
        match_config: MatchConfig,
        room_rx: flume::Receiver<RoomState>,
    ) -> Self {
        let (command_tx, command_rx) = flume::unbounded();
        let match_config = match_config.with_garbage_delay_ms(config.attack_delay_ms);
        Self {
            me,
            room,
            config,
            store,
            channel,
            engine: MatchEngine::new(match_config),
            opponent: OpponentView::new(),
            room_rx,
            command_tx,
            command_rx,
            phase: Phase::WaitingForGuest,
            epoch: None,
        }
    }

    fn start(&mut self) {
        self.epoch = Some(Instant::now());
        self.engine.start(0);
        self.phase = Phase::Playing;
        self.offer_state();
        tracing::info!("Player '{}' started the match in room '{}'", self.me, self.room.id);
    }

    /// Get a sender for sending commands to this session
    pub fn sender(&self) -> flume::Sender<MatchCommand> {
        self.command_tx.clone()
    }

    pub fn player(&self) -> &PlayerId {
        &self.me
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    pub fn opponent(&self) -> &OpponentView {
        &self.opponent
    }

    pub fn is_waiting(&self) -> bool {
        self.phase == Phase::WaitingForGuest
    }

    /// Transport is currently failing
    pub fn is_degraded(&self) -> bool {
        self.channel.is_degraded()
    }

    pub fn stats(&self) -> SyncStats {
        self.channel.stats()
    }

    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        self.engine.take_events()
    }

    fn elapsed_ms(&self) -> u64 {
        self.epoch
            .map(|epoch| epoch.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn engine_deadline(&self) -> Option<Instant> {
        let epoch = self.epoch?;
        let at = self.engine.next_deadline()?;
        Some(epoch + std::time::Duration::from_millis(at))
    }

    /// Queue the current local state for the next throttled transmission
    fn offer_state(&mut self) {
        let attack = self.engine.take_outbound_attack();
        let draft = SyncSnapshot::from_state(self.engine.state(), attack);
        self.channel.offer(Instant::now(), draft);
    }

    /// Publish the change of local state; finish the match if it ended
    async fn after_engine_change(&mut self) -> zenoh_duel::Result<StepResult> {
        match self.engine.take_final_report() {
            None => {
                self.offer_state();
                Ok(StepResult::Updated)
            }
            Some(report) => {
                let attack = self.engine.take_outbound_attack();
                let draft = SyncSnapshot::from_state(self.engine.state(), attack);
                if self.channel.send_now(Instant::now(), draft).await.is_none() {
                    tracing::warn!(
                        "Player '{}' will retry the final snapshot of room '{}'",
                        self.me,
                        self.room.id
                    );
                }
                let outcome = self.finish(report).await?;
                Ok(StepResult::GameOver(outcome))
            }
        }
    }

    fn apply_inbound(&mut self, inbound: Inbound<SyncSnapshot>) -> bool {
        match inbound {
            Inbound::Applied(snapshot) => {
                if snapshot.attack > 0 && self.phase != Phase::Finished {
                    tracing::debug!(
                        "Player '{}' received {} garbage row(s)",
                        self.me,
                        snapshot.attack
                    );
                    self.engine.receive_attack(self.elapsed_ms(), snapshot.attack);
                }
                self.opponent.apply(snapshot);
                true
            }
            Inbound::Foreign(sender) => {
                tracing::debug!("Player '{}' ignored snapshot from '{}'", self.me, sender);
                false
            }
            Inbound::Own | Inbound::Stale(_) | Inbound::Malformed(_) => false,
        }
    }

    /// Execute one step of the session
    ///
    /// Returns when either:
    /// - the guest arrives (returns Started)
    /// - local or opponent state changes (returns Updated)
    /// - the match ends (returns GameOver, then Stop on later calls)
    /// - the step timeout elapses (returns Timeout)
    /// - a Stop command is received (returns Stop)
    pub async fn step(&mut self) -> zenoh_duel::Result<StepResult> {
        if self.phase == Phase::Finished {
            return Ok(StepResult::Stop);
        }

        let sleep = tokio::time::sleep(self.config.step_timeout());
        tokio::pin!(sleep);

        loop {
            let engine_at = self.engine_deadline();
            let sync_at = self.channel.deadline();

            tokio::select! {
                () = &mut sleep => {
                    return Ok(StepResult::Timeout);
                }
                // Gravity, speed-up or deferred garbage due
                () = tokio::time::sleep_until(engine_at.unwrap_or_else(Instant::now)), if engine_at.is_some() => {
                    if self.engine.advance(self.elapsed_ms()) {
                        return self.after_engine_change().await;
                    }
                }
                // Throttle window expired
                () = tokio::time::sleep_until(sync_at.unwrap_or_else(Instant::now)), if sync_at.is_some() => {
                    self.channel.poll_outbound(Instant::now()).await;
                }
                delivery = self.channel.recv() => {
                    let inbound = self.channel.reconcile(delivery?);
                    if self.apply_inbound(inbound) {
                        return Ok(StepResult::Updated);
                    }
                }
                room = self.room_rx.recv_async() => {
                    let Ok(room) = room else {
                        tracing::warn!("Room '{}' watch closed", self.room.id);
                        return Ok(StepResult::Stop);
                    };
                    if let Some(result) = self.on_room_change(room).await? {
                        return Ok(result);
                    }
                }
                command = self.command_rx.recv_async() => match command {
                    Err(_) | Ok(MatchCommand::Stop) => {
                        tracing::info!("Player '{}' stopping session in room '{}'", self.me, self.room.id);
                        self.phase = Phase::Finished;
                        return Ok(StepResult::Stop);
                    }
                    Ok(MatchCommand::Input(action)) => {
                        if self.phase == Phase::Playing && self.engine.apply(action, self.elapsed_ms()) {
                            return self.after_engine_change().await;
                        }
                    }
                }
            }
        }
    }

    async fn on_room_change(&mut self, room: RoomState) -> zenoh_duel::Result<Option<StepResult>> {
        let status = room.status;
        self.room = room;
        match (self.phase, status) {
            (Phase::WaitingForGuest, RoomStatus::Playing) => {
                let Some(guest) = self.room.guest.clone() else {
                    return Ok(None);
                };
                tracing::info!("Player '{}' joined room '{}'", guest, self.room.id);
                self.channel.set_peer(guest);
                self.start();
                Ok(Some(StepResult::Started))
            }
            (Phase::Playing, RoomStatus::Finished) => {
                // The opponent finished the room first; our match ends here
                self.engine.end();
                Ok(Some(self.after_engine_change().await?))
            }
            (Phase::WaitingForGuest, RoomStatus::Finished) => {
                self.phase = Phase::Finished;
                Ok(Some(StepResult::Stop))
            }
            _ => Ok(None),
        }
    }

    /// Keep applying opponent snapshots and room changes until `deadline`,
    /// retrying the final snapshot while it is still pending
    ///
    /// Stops early once the room is finished and nothing is pending.
    async fn collect_final_state(&mut self, deadline: Instant) {
        while self.room.status != RoomStatus::Finished || self.channel.has_pending() {
            let sync_at = self.channel.deadline();
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                () = tokio::time::sleep_until(sync_at.unwrap_or_else(Instant::now)), if sync_at.is_some() => {
                    self.channel.poll_outbound(Instant::now()).await;
                }
                delivery = self.channel.recv() => match delivery {
                    Ok(delivery) => {
                        if let Inbound::Applied(snapshot) = self.channel.reconcile(delivery) {
                            self.opponent.apply(snapshot);
                        }
                    }
                    Err(_) => break,
                },
                room = self.room_rx.recv_async() => match room {
                    Ok(room) => self.room = room,
                    Err(_) => break,
                },
            }
        }
    }

    /// Report the final score, settle the winner and finalize the room
    async fn finish(&mut self, report: FinalReport) -> zenoh_duel::Result<MatchOutcome> {
        self.phase = Phase::Finished;
        tracing::info!(
            "Player '{}' game over in room '{}': score {}, level {}, lines {}",
            self.me,
            self.room.id,
            report.score,
            report.level,
            report.lines
        );

        match self.store.report_score(&self.room.id, &self.me, report.score).await {
            Ok(room) => self.room = room,
            Err(e) => tracing::error!(
                "Player '{}' failed to report score to room '{}': {}",
                self.me,
                self.room.id,
                e
            ),
        }

        if self.room.status != RoomStatus::Finished || self.channel.has_pending() {
            self.collect_final_state(Instant::now() + self.config.final_report_wait())
                .await;
        }
        if self.room.status != RoomStatus::Finished {
            match self.store.get_room(&self.room.id).await {
                Ok(room) => self.room = room,
                Err(e) => tracing::warn!("Failed to refresh room '{}': {}", self.room.id, e),
            }
        }

        let opponent = self.room.opponent_of(&self.me).cloned();
        let opponent_score = opponent
            .as_ref()
            .and_then(|opponent| self.room.score_of(opponent))
            .or_else(|| self.opponent.score());

        if self.room.status != RoomStatus::Finished {
            let winner = resolve_winner(&self.me, report.score, opponent.as_ref(), opponent_score);
            match self.store.finalize_room(&self.room.id, winner.clone()).await {
                Ok(room) => self.room = room,
                Err(e) => {
                    tracing::error!("Failed to finalize room '{}': {}", self.room.id, e);
                    self.room.winner = winner;
                }
            }
        }

        Ok(MatchOutcome {
            room: self.room.id.clone(),
            winner: self.room.winner.clone(),
            report,
            opponent_score,
        })
    }
}
