//! Room and session coordination for the chess game server.
//!
//! Each browser connection is a WebSocket driven by a
//! [`SessionCoordinator`]. A connection either hosts a room and plays the
//! AI (White against an [`gambit_ai::AiBackend`]) or joins an existing room
//! as Black, in which case the server only relays moves between the two
//! players. Shared state lives in the [`AppContext`]: the connection and room
//! registries, the transport hub used for room broadcasts, and the runtime
//! engine settings.

pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod settings;

pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{outbound_channel, ConnectionHub, OutboundReceiver, OutboundSender};
pub use logging::{init_logging, LogEntry, LogFormat, TestLogSubscriber};
pub use middleware::{log_response, request_log, RequestMetrics};
pub use protocol::{ClientEvent, ClientFrame, JoinOutcome, MalformedFrame, RejectReason, ServerEvent};
pub use registry::{
    Color, ConnectionId, ConnectionRecord, ConnectionRegistry, RegistryError, RoomId, RoomRecord,
    RoomRegistry,
};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use session::{
    EngineCompletion, EngineJobResult, EngineSlot, JoinRoute, SessionCoordinator, SessionError,
    SessionState,
};
pub use settings::{AppSettings, SettingsError, SettingsStore};
