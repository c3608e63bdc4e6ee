//! Per-connection session handling.
//!
//! A [`SessionCoordinator`] owns everything one socket needs: its place in
//! the registries, the remembered difficulty and model, and (in AI mode) the
//! engine backend. Frames are handled one at a time in arrival order. Work
//! that can take a while (starting a backend, searching for a reply) runs as a
//! spawned job that takes the backend by value and reports back through the
//! coordinator's completion channel, so at most one engine operation per
//! connection is ever in flight.

use crate::errors::{log_error, ErrorSeverity, IntoErrorResponse};
use crate::events::OutboundSender;
use crate::protocol::{ClientEvent, ClientFrame, RejectReason, ServerEvent};
use crate::registry::{Color, ConnectionId, ConnectionRecord, RegistryError, RoomId};
use crate::server::AppContext;
use crate::settings::SettingsError;
use gambit_ai::{AiBackend, EngineAdapter, EngineError, ModelKind, ReplyMove, Strength};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::http::StatusCode;

/// Where a connection is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No successful `joinRoom` yet.
    Unbound,
    /// Created a room; waiting for the AI backend before acknowledging.
    HostPendingEngine,
    HostReady,
    /// Took the Black seat in someone else's room.
    GuestReady,
    /// Sent `joinRoom` again after already having a record.
    Reconnected,
}

/// How a `joinRoom` request is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRoute {
    /// The connection already has a record; answer from it.
    Rejoin(ConnectionRecord),
    /// No record and no room requested: open a new AI room.
    CreateRoom,
    /// No record and a room requested: take its Black seat.
    JoinExisting(RoomId),
}

impl JoinRoute {
    pub fn classify(existing: Option<ConnectionRecord>, requested: Option<&str>) -> Self {
        let requested = requested.map(str::trim).filter(|id| !id.is_empty());
        match (existing, requested) {
            (Some(record), _) => JoinRoute::Rejoin(record),
            (None, None) => JoinRoute::CreateRoom,
            (None, Some(room_id)) => JoinRoute::JoinExisting(room_id.to_string()),
        }
    }
}

/// The connection's AI backend, if any.
#[derive(Debug, Default)]
pub enum EngineSlot {
    #[default]
    Absent,
    /// A job holds the backend or is building one. `parked` keeps the
    /// previous backend while a replacement loads.
    Busy { parked: Option<AiBackend> },
    Ready(AiBackend),
}

impl EngineSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineSlot::Ready(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, EngineSlot::Busy { .. })
    }
}

/// Outcome of a spawned engine job.
#[derive(Debug)]
pub enum EngineJobResult {
    HostLoaded {
        room_id: RoomId,
        result: Result<AiBackend, EngineError>,
    },
    ModelSwitched {
        kind: ModelKind,
        result: Result<AiBackend, EngineError>,
    },
    NewGameLoaded {
        result: Result<AiBackend, EngineError>,
    },
    ReplyComputed {
        backend: AiBackend,
        result: Result<Option<ReplyMove>, EngineError>,
    },
}

/// A finished job plus the ack id of the request that started it.
#[derive(Debug)]
pub struct EngineCompletion {
    pub ack: Option<u64>,
    pub result: EngineJobResult,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Room is full: {0}")]
    Capacity(RoomId),
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("AI engine failed to load: {0}")]
    EngineLoad(#[source] EngineError),
    #[error("AI engine is not loaded")]
    EngineUnavailable,
    #[error("AI engine is busy")]
    EngineBusy,
    #[error("Not available in multiplayer mode")]
    ModeViolation,
    #[error("Move rejected: {0}")]
    Validation(#[source] EngineError),
    #[error("AI engine failed: {0}")]
    Engine(#[source] EngineError),
    #[error("Connection has not joined a room")]
    Unbound,
    #[error("Unknown AI model: {0}")]
    UnknownModel(String),
    #[error(transparent)]
    Registry(RegistryError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<RegistryError> for SessionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::RoomFull(room_id) => SessionError::Capacity(room_id),
            RegistryError::RoomNotFound(room_id) => SessionError::RoomNotFound(room_id),
            other => SessionError::Registry(other),
        }
    }
}

impl IntoErrorResponse for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Capacity(_) => StatusCode::CONFLICT,
            SessionError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            SessionError::EngineLoad(_) | SessionError::Engine(_) => StatusCode::BAD_GATEWAY,
            SessionError::EngineUnavailable | SessionError::EngineBusy => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SessionError::ModeViolation | SessionError::Unbound => StatusCode::CONFLICT,
            SessionError::Validation(_) | SessionError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            SessionError::Registry(_) | SessionError::Settings(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SessionError::Capacity(_) => "room_full",
            SessionError::RoomNotFound(_) => "room_not_found",
            SessionError::EngineLoad(_) => "engine_load_failed",
            SessionError::EngineUnavailable => "engine_unavailable",
            SessionError::EngineBusy => "engine_busy",
            SessionError::ModeViolation => "mode_violation",
            SessionError::Validation(_) => "illegal_move",
            SessionError::Engine(_) => "engine_failed",
            SessionError::Unbound => "not_joined",
            SessionError::UnknownModel(_) => "unknown_model",
            SessionError::Registry(_) => "registry_error",
            SessionError::Settings(_) => "settings_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            SessionError::Registry(RegistryError::StoragePoisoned)
            | SessionError::Settings(SettingsError::StoragePoisoned) => ErrorSeverity::Critical,
            SessionError::EngineLoad(_)
            | SessionError::Engine(_)
            | SessionError::Registry(_)
            | SessionError::Settings(_) => ErrorSeverity::Server,
            _ => ErrorSeverity::Client,
        }
    }
}

/// Drives one connection.
#[derive(Debug)]
pub struct SessionCoordinator {
    ctx: AppContext,
    conn_id: ConnectionId,
    state: SessionState,
    difficulty: Strength,
    model: ModelKind,
    engine: EngineSlot,
    jobs_in_flight: usize,
    completions_tx: mpsc::UnboundedSender<EngineCompletion>,
    completions_rx: mpsc::UnboundedReceiver<EngineCompletion>,
}

impl SessionCoordinator {
    /// Registers `outbound` with the hub under `conn_id`.
    pub fn new(ctx: AppContext, conn_id: impl Into<ConnectionId>, outbound: OutboundSender) -> Self {
        let conn_id = conn_id.into();
        ctx.hub().attach(&conn_id, outbound);

        let defaults = ctx.settings().get().unwrap_or_default();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            ctx,
            conn_id,
            state: SessionState::Unbound,
            difficulty: defaults.default_strength(),
            model: defaults.default_model,
            engine: EngineSlot::Absent,
            jobs_in_flight: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn difficulty(&self) -> Strength {
        self.difficulty
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn engine(&self) -> &EngineSlot {
        &self.engine
    }

    pub fn engine_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// FEN of the loaded backend's game.
    pub fn current_position(&self) -> Option<String> {
        match &self.engine {
            EngineSlot::Ready(backend) => Some(backend.current_position()),
            _ => None,
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs_in_flight
    }

    /// Processes frames and job completions until the inbound channel
    /// closes, then tears the session down.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ClientFrame>) {
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => break,
                },
                Some(done) = self.completions_rx.recv() => self.handle_completion(done),
            }
        }
        self.disconnect();
    }

    pub async fn next_completion(&mut self) -> Option<EngineCompletion> {
        self.completions_rx.recv().await
    }

    /// Waits for and applies every outstanding job result.
    pub async fn settle(&mut self) {
        while self.jobs_in_flight > 0 {
            match self.completions_rx.recv().await {
                Some(done) => self.handle_completion(done),
                None => break,
            }
        }
    }

    pub fn handle_frame(&mut self, frame: ClientFrame) {
        let span = tracing::debug_span!("session", conn_id = %self.conn_id);
        let _entered = span.enter();

        let ClientFrame { ack, event } = frame;
        let name = event.name();
        tracing::trace!(event = name, ?ack, "frame received");

        self.release_engine_if_paired();

        let outcome = match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(room_id.as_deref(), ack),
            ClientEvent::PlayerMakeMove { from, to } => self.player_make_move(from, to),
            ClientEvent::PlayerUndo => self.player_undo().map(Reply::Ack),
            ClientEvent::SetDifficulty { level } => self.set_difficulty(level).map(Reply::Ack),
            ClientEvent::SetAiModel { name } => self.set_ai_model(&name, ack),
            ClientEvent::SetNewGame => self.set_new_game(ack),
        };

        match outcome {
            Ok(Reply::Ack(success)) => self.ack(ack, success),
            Ok(Reply::Seat(room_id, color)) => self.join_ack(ack, Some((room_id, color))),
            Ok(Reply::Deferred) | Ok(Reply::None) => {}
            Err(err) => {
                self.report(name, &err);
                match name {
                    "joinRoom" => self.join_ack(ack, None),
                    _ => self.ack(ack, false),
                }
            }
        }
    }

    pub fn handle_completion(&mut self, done: EngineCompletion) {
        let span = tracing::debug_span!("session", conn_id = %self.conn_id);
        let _entered = span.enter();

        self.jobs_in_flight = self.jobs_in_flight.saturating_sub(1);
        let EngineCompletion { ack, result } = done;

        match result {
            EngineJobResult::HostLoaded { room_id, result } => {
                self.finish_host_load(ack, room_id, result)
            }
            EngineJobResult::ModelSwitched { kind, result } => {
                self.finish_model_switch(ack, kind, result)
            }
            EngineJobResult::NewGameLoaded { result } => self.finish_new_game(ack, result),
            EngineJobResult::ReplyComputed { backend, result } => {
                self.finish_reply(backend, result)
            }
        }
    }

    /// Announces the departure to the room, then forgets the room and the
    /// connection. The room record goes even if another player is still in
    /// it.
    pub fn disconnect(mut self) {
        let span = tracing::debug_span!("session", conn_id = %self.conn_id);
        let _entered = span.enter();

        match self.ctx.connections().get(&self.conn_id) {
            Ok(Some(record)) => {
                let hub = self.ctx.hub();
                hub.broadcast_except(
                    &record.room_id,
                    &self.conn_id,
                    ServerEvent::OpponentDisconnected,
                );
                if let Err(err) = self.ctx.rooms().delete_room(&record.room_id) {
                    self.report("disconnect", &err.into());
                }
                if let Err(err) = self.ctx.connections().remove(&self.conn_id) {
                    self.report("disconnect", &err.into());
                }
                tracing::info!(room_id = %record.room_id, "player left room");
            }
            Ok(None) => {}
            Err(err) => self.report("disconnect", &err.into()),
        }

        self.ctx.hub().detach(&self.conn_id);

        if self.jobs_in_flight > 0 {
            tracing::debug!(
                pending = self.jobs_in_flight,
                "discarding engine work still in flight"
            );
        }
        self.engine = EngineSlot::Absent;
    }

    fn join_room(&mut self, requested: Option<&str>, ack: Option<u64>) -> Result<Reply, SessionError> {
        if self.state == SessionState::HostPendingEngine {
            return Err(SessionError::EngineBusy);
        }

        let existing = self.ctx.connections().get(&self.conn_id)?;
        match JoinRoute::classify(existing, requested) {
            JoinRoute::Rejoin(record) => {
                self.ctx.hub().join(&record.room_id, &self.conn_id);
                self.state = SessionState::Reconnected;
                tracing::info!(room_id = %record.room_id, color = %record.color, "rejoined room");
                Ok(Reply::Seat(record.room_id, record.color))
            }
            JoinRoute::CreateRoom => self.create_room(ack),
            JoinRoute::JoinExisting(room_id) => self.join_existing(room_id),
        }
    }

    fn create_room(&mut self, ack: Option<u64>) -> Result<Reply, SessionError> {
        let settings = self.ctx.settings().get()?;
        let options = settings.engine_options();
        self.difficulty = settings.default_strength();
        self.model = settings.default_model;

        let room_id = Uuid::new_v4().to_string();
        self.ctx
            .connections()
            .register(&self.conn_id, &room_id, Color::White, false)?;
        self.ctx
            .rooms()
            .assign_seat(&room_id, &self.conn_id, Color::White)?;

        self.state = SessionState::HostPendingEngine;
        self.engine = EngineSlot::Busy { parked: None };

        tracing::info!(
            room_id = %room_id,
            model = %self.model,
            level = self.difficulty.level(),
            "room created, loading AI engine"
        );

        let (kind, strength) = (self.model, self.difficulty);
        self.spawn_job(ack, async move {
            let result = AiBackend::load(kind, strength, "", &options).await;
            EngineJobResult::HostLoaded { room_id, result }
        });
        Ok(Reply::Deferred)
    }

    fn join_existing(&mut self, room_id: RoomId) -> Result<Reply, SessionError> {
        let room = self.ctx.rooms().claim_guest_seat(&room_id, &self.conn_id)?;
        self.ctx
            .connections()
            .register(&self.conn_id, &room_id, Color::Black, true)?;

        if let Some(host) = room.seat(Color::White) {
            self.ctx.connections().set_multiplayer(host, true)?;
        }

        let hub = self.ctx.hub();
        hub.join(&room_id, &self.conn_id);
        hub.broadcast_except(&room_id, &self.conn_id, ServerEvent::SetNewGame);

        self.state = SessionState::GuestReady;
        tracing::info!(room_id = %room_id, "guest joined room as black");
        Ok(Reply::Seat(room_id, Color::Black))
    }

    fn player_make_move(&mut self, from: String, to: String) -> Result<Reply, SessionError> {
        let record = self.record()?;

        if record.multiplayer {
            self.ctx.hub().broadcast_except(
                &record.room_id,
                &self.conn_id,
                ServerEvent::OpponentMakeMove { from, to },
            );
            return Ok(Reply::None);
        }

        let mut backend = match std::mem::take(&mut self.engine) {
            EngineSlot::Ready(backend) => backend,
            other => {
                let reason = if self.state == SessionState::HostPendingEngine
                    || !other.is_busy()
                {
                    RejectReason::EngineNotReady
                } else {
                    RejectReason::EngineBusy
                };
                self.engine = other;
                tracing::warn!(from = %from, to = %to, ?reason, "move dropped, engine not available");
                self.send(ServerEvent::MoveRejected { from, to, reason });
                return Ok(Reply::None);
            }
        };

        if let Err(err) = backend.apply_opponent_move(&from, &to) {
            self.engine = EngineSlot::Ready(backend);
            if err.is_rejection() {
                self.send(ServerEvent::MoveRejected {
                    from,
                    to,
                    reason: RejectReason::IllegalMove,
                });
                return Err(SessionError::Validation(err));
            }
            return Err(SessionError::Engine(err));
        }

        let status = backend.status();
        if status.is_over() {
            self.engine = EngineSlot::Ready(backend);
            self.send(ServerEvent::GameOver { status });
            return Ok(Reply::None);
        }

        self.engine = EngineSlot::Busy { parked: None };
        self.spawn_job(None, async move {
            let result = backend.compute_reply().await;
            EngineJobResult::ReplyComputed { backend, result }
        });
        Ok(Reply::None)
    }

    fn player_undo(&mut self) -> Result<bool, SessionError> {
        self.require_ai_mode()?;
        let backend = self.ready_engine()?;
        match backend.undo_last_two_plies() {
            Ok(undone) => {
                tracing::debug!(undone, "undo requested");
                Ok(true)
            }
            Err(err) => Err(SessionError::Engine(err)),
        }
    }

    fn set_difficulty(&mut self, level: i64) -> Result<bool, SessionError> {
        self.require_ai_mode()?;
        let strength = Strength::new(level);
        self.ready_engine()?.set_strength(strength);
        self.difficulty = strength;
        tracing::info!(level = strength.level(), "difficulty changed");
        Ok(true)
    }

    fn set_ai_model(&mut self, name: &str, ack: Option<u64>) -> Result<Reply, SessionError> {
        self.require_ai_mode()?;
        let kind: ModelKind = name
            .parse()
            .map_err(|_| SessionError::UnknownModel(name.to_string()))?;
        if self.engine.is_busy() {
            return Err(SessionError::EngineBusy);
        }
        let options = self.ctx.settings().engine_options()?;

        let parked = match std::mem::take(&mut self.engine) {
            EngineSlot::Ready(backend) => Some(backend),
            _ => None,
        };
        let seed = parked
            .as_ref()
            .map(|backend| backend.current_position())
            .unwrap_or_default();
        self.engine = EngineSlot::Busy { parked };

        tracing::info!(model = %kind, "switching AI model");
        let strength = self.difficulty;
        self.spawn_job(ack, async move {
            let result = AiBackend::load(kind, strength, &seed, &options).await;
            EngineJobResult::ModelSwitched { kind, result }
        });
        Ok(Reply::Deferred)
    }

    fn set_new_game(&mut self, ack: Option<u64>) -> Result<Reply, SessionError> {
        let record = self.record()?;

        if record.multiplayer {
            self.ctx
                .hub()
                .broadcast_except(&record.room_id, &self.conn_id, ServerEvent::SetNewGame);
            return Ok(Reply::Ack(true));
        }

        if self.engine.is_busy() {
            return Err(SessionError::EngineBusy);
        }
        let options = self.ctx.settings().engine_options()?;

        self.engine = EngineSlot::Busy { parked: None };
        let (kind, strength) = (self.model, self.difficulty);
        tracing::info!(model = %kind, "starting new game");
        self.spawn_job(ack, async move {
            let result = AiBackend::load(kind, strength, "", &options).await;
            EngineJobResult::NewGameLoaded { result }
        });
        Ok(Reply::Deferred)
    }

    fn finish_host_load(
        &mut self,
        ack: Option<u64>,
        room_id: RoomId,
        result: Result<AiBackend, EngineError>,
    ) {
        let paired = self.is_multiplayer();

        match result {
            Ok(backend) => {
                self.engine = if paired {
                    EngineSlot::Absent
                } else {
                    EngineSlot::Ready(backend)
                };
            }
            // A guest took the other seat while the engine loaded; the room
            // no longer needs one.
            Err(err) if paired => {
                tracing::debug!(error = %err, "engine load failed after room was paired");
                self.engine = EngineSlot::Absent;
            }
            Err(err) => {
                self.engine = EngineSlot::Absent;
                self.state = SessionState::Unbound;
                self.rollback_host(&room_id);
                self.report("joinRoom", &SessionError::EngineLoad(err));
                self.join_ack(ack, None);
                return;
            }
        }

        self.ctx.hub().join(&room_id, &self.conn_id);
        self.state = SessionState::HostReady;
        tracing::info!(room_id = %room_id, model = %self.model, "room ready");
        self.join_ack(ack, Some((room_id, Color::White)));
    }

    fn rollback_host(&self, room_id: &str) {
        if let Err(err) = self.ctx.connections().remove(&self.conn_id) {
            self.report("joinRoom", &err.into());
        }
        if let Err(err) = self.ctx.rooms().delete_room(room_id) {
            self.report("joinRoom", &err.into());
        }
    }

    fn finish_model_switch(
        &mut self,
        ack: Option<u64>,
        kind: ModelKind,
        result: Result<AiBackend, EngineError>,
    ) {
        let parked = match std::mem::take(&mut self.engine) {
            EngineSlot::Busy { parked } => parked,
            EngineSlot::Ready(backend) => Some(backend),
            EngineSlot::Absent => None,
        };

        match result {
            Ok(backend) => {
                drop(parked);
                self.model = kind;
                self.engine = self.keep_unless_paired(backend);
                tracing::info!(model = %kind, "AI model switched");
                self.ack(ack, true);
            }
            Err(err) => {
                self.engine = match parked {
                    Some(previous) => self.keep_unless_paired(previous),
                    None => EngineSlot::Absent,
                };
                self.report("setAIModel", &SessionError::EngineLoad(err));
                self.ack(ack, false);
            }
        }
    }

    fn finish_new_game(&mut self, ack: Option<u64>, result: Result<AiBackend, EngineError>) {
        match result {
            Ok(backend) => {
                self.engine = self.keep_unless_paired(backend);
                self.ack(ack, true);
            }
            Err(err) => {
                self.engine = EngineSlot::Absent;
                self.report("setNewGame", &SessionError::EngineLoad(err));
                self.ack(ack, false);
            }
        }
    }

    fn finish_reply(&mut self, backend: AiBackend, result: Result<Option<ReplyMove>, EngineError>) {
        if self.is_multiplayer() {
            // The board was reset for two players; this reply belongs to the old game.
            tracing::info!("room is now multiplayer, discarding AI reply");
            self.engine = EngineSlot::Absent;
            return;
        }
        match result {
            Ok(Some(reply)) => {
                let status = reply.status;
                tracing::debug!(uci = %reply.uci, "AI replied");
                self.engine = self.keep_unless_paired(backend);
                self.send(ServerEvent::OpponentMakeMove {
                    from: reply.from,
                    to: reply.to,
                });
                if status.is_over() {
                    self.send(ServerEvent::GameOver { status });
                }
            }
            Ok(None) => {
                let status = backend.status();
                self.engine = self.keep_unless_paired(backend);
                if status.is_over() {
                    self.send(ServerEvent::GameOver { status });
                }
            }
            // The backend may be mid-search or dead; start over with
            // setNewGame or setAIModel.
            Err(err) => {
                self.engine = EngineSlot::Absent;
                self.report("playerMakeMove", &SessionError::Engine(err));
            }
        }
    }

    fn spawn_job<F>(&mut self, ack: Option<u64>, job: F)
    where
        F: std::future::Future<Output = EngineJobResult> + Send + 'static,
    {
        self.jobs_in_flight += 1;
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = job.await;
            // Closed after disconnect; the result is dropped with its backend.
            let _ = completions.send(EngineCompletion { ack, result });
        });
    }

    /// A host whose room gained a guest plays the guest, not the engine.
    fn release_engine_if_paired(&mut self) {
        if self.engine.is_ready() && self.is_multiplayer() {
            tracing::info!("room is now multiplayer, releasing AI engine");
            self.engine = EngineSlot::Absent;
        }
    }

    fn keep_unless_paired(&self, backend: AiBackend) -> EngineSlot {
        if self.is_multiplayer() {
            EngineSlot::Absent
        } else {
            EngineSlot::Ready(backend)
        }
    }

    fn is_multiplayer(&self) -> bool {
        matches!(
            self.ctx.connections().get(&self.conn_id),
            Ok(Some(ConnectionRecord {
                multiplayer: true,
                ..
            }))
        )
    }

    fn record(&self) -> Result<ConnectionRecord, SessionError> {
        self.ctx
            .connections()
            .get(&self.conn_id)?
            .ok_or(SessionError::Unbound)
    }

    fn require_ai_mode(&self) -> Result<ConnectionRecord, SessionError> {
        let record = self.record()?;
        if record.multiplayer {
            return Err(SessionError::ModeViolation);
        }
        Ok(record)
    }

    fn ready_engine(&mut self) -> Result<&mut AiBackend, SessionError> {
        match &mut self.engine {
            EngineSlot::Ready(backend) => Ok(backend),
            EngineSlot::Busy { .. } => Err(SessionError::EngineBusy),
            EngineSlot::Absent => Err(SessionError::EngineUnavailable),
        }
    }

    fn send(&self, event: ServerEvent) {
        self.ctx.hub().send_to(&self.conn_id, event);
    }

    fn ack(&self, ack: Option<u64>, success: bool) {
        if let Some(id) = ack {
            self.send(ServerEvent::ack(id, success));
        }
    }

    fn join_ack(&self, ack: Option<u64>, seat: Option<(RoomId, Color)>) {
        if let Some(id) = ack {
            self.send(ServerEvent::join_ack(id, seat));
        }
    }

    fn report(&self, event: &'static str, err: &SessionError) {
        tracing::debug!(event, state = ?self.state, "request failed");
        log_error(err.severity(), &err.to_error_response());
    }
}

/// What the dispatcher sends back for a handled frame.
enum Reply {
    Ack(bool),
    Seat(RoomId, Color),
    /// A job will send the acknowledgement when it finishes.
    Deferred,
    None,
}
