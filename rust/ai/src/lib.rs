//! # gambit-ai: AI Opponents for Chess
//!
//! Move-search backends behind one contract, so a game can switch opponents
//! without losing its position.
//!
//! ## Core Components
//!
//! - [`EngineAdapter`] - Trait every backend implements
//! - [`minimax`] - In-process alpha-beta search ([`MinimaxBackend`])
//! - [`search`] - Driver for an external UCI engine process ([`SearchBackend`])
//! - [`AiBackend`] - Closed set of backends with static dispatch
//! - [`AiBackend::load`] - Factory used whenever a backend is (re)created
//!
//! ## Quick Start
//!
//! ```rust
//! use gambit_ai::{AiBackend, EngineAdapter, EngineOptions, ModelKind, Strength};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gambit_ai::EngineError> {
//! let options = EngineOptions::default();
//! let mut ai = AiBackend::load(ModelKind::Minimax, Strength::new(0), "", &options).await?;
//!
//! ai.apply_opponent_move("e2", "e4")?;
//! let reply = ai.compute_reply().await?.expect("black has moves");
//! println!("AI answers {} -> {}", reply.from, reply.to);
//! # Ok(())
//! # }
//! ```
//!
//! ## AI Types
//!
//! - `"minimax"` - Depth-limited alpha-beta search, deterministic
//! - `"stockfish"` - Any UCI engine reachable as an executable

use gambit_engine::rules::{AppliedMove, GameStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub mod errors;
pub mod minimax;
pub mod search;
pub mod uci;

pub use errors::EngineError;
pub use minimax::MinimaxBackend;
pub use search::SearchBackend;

/// Contract every move-search backend satisfies.
///
/// Positions are exchanged as FEN strings so a game can move between
/// backends: export with [`current_position`](EngineAdapter::current_position)
/// and seed the replacement with it.
pub trait EngineAdapter: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// FEN of the position the backend is playing from.
    fn current_position(&self) -> String;

    /// Plays the human's move, given as the two squares the piece moved
    /// between. Illegal moves are rejected and leave the position unchanged.
    fn apply_opponent_move(&mut self, from: &str, to: &str) -> Result<AppliedMove, EngineError>;

    /// Searches for and plays the backend's own move. `Ok(None)` means the
    /// side to move has no move to make (the game is over).
    fn compute_reply(
        &mut self,
    ) -> impl Future<Output = Result<Option<ReplyMove>, EngineError>> + Send;

    /// Takes back the backend's last reply and the human move before it.
    /// With fewer than two plies on the board this does nothing and
    /// returns `Ok(false)`.
    fn undo_last_two_plies(&mut self) -> Result<bool, EngineError>;

    /// Changes search strength for subsequent replies.
    fn set_strength(&mut self, strength: Strength);

    fn strength(&self) -> Strength;

    fn status(&self) -> GameStatus;
}

/// A move chosen and played by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMove {
    pub from: String,
    pub to: String,
    pub uci: String,
    /// Game status after the reply was played.
    pub status: GameStatus,
}

impl ReplyMove {
    pub fn new(applied: &AppliedMove, status: GameStatus) -> Self {
        Self {
            from: applied.from.to_string(),
            to: applied.to.to_string(),
            uci: applied.uci.clone(),
            status,
        }
    }
}

/// Difficulty level requested by the player, `0..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strength(u8);

impl Strength {
    pub const MAX: u8 = 10;

    /// Out-of-range levels are clamped rather than rejected.
    pub fn new(level: i64) -> Self {
        Self(level.clamp(0, i64::from(Self::MAX)) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn minimax_depth(self) -> u8 {
        (self.0 + 2).min(5)
    }

    /// Value for the UCI `Skill Level` option (0..=20).
    pub fn skill_level(self) -> u8 {
        (self.0 * 2).min(20)
    }

    pub fn search_depth(self) -> u8 {
        (6 + self.0 * 2).min(24)
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names a backend as the browser does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "minimax")]
    Minimax,
    #[serde(rename = "stockfish")]
    Search,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Minimax => "minimax",
            ModelKind::Search => "stockfish",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minimax" => Ok(ModelKind::Minimax),
            "stockfish" => Ok(ModelKind::Search),
            _ => Err(EngineError::UnknownModel(raw.to_string())),
        }
    }
}

/// How to reach the external search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub search_path: PathBuf,
    pub search_args: Vec<String>,
    pub handshake_timeout: Duration,
    pub move_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            search_path: PathBuf::from("stockfish"),
            search_args: Vec::new(),
            handshake_timeout: Duration::from_secs(10),
            move_timeout: Duration::from_secs(30),
        }
    }
}

/// The backends a session can hold. Calls dispatch statically; only
/// [`AiBackend::load`] chooses between them at runtime.
#[derive(Debug)]
pub enum AiBackend {
    Minimax(MinimaxBackend),
    Search(SearchBackend),
}

impl AiBackend {
    /// Builds a backend of the requested kind, resuming from `seed_fen`
    /// (empty for a new game). Search backends start their process here and
    /// fail instead of returning a half-initialised engine.
    pub async fn load(
        kind: ModelKind,
        strength: Strength,
        seed_fen: &str,
        options: &EngineOptions,
    ) -> Result<Self, EngineError> {
        let backend = match kind {
            ModelKind::Minimax => {
                AiBackend::Minimax(MinimaxBackend::from_position(strength, seed_fen)?)
            }
            ModelKind::Search => {
                AiBackend::Search(SearchBackend::launch(strength, seed_fen, options).await?)
            }
        };

        tracing::debug!(
            model = %kind,
            level = strength.level(),
            seeded = !seed_fen.trim().is_empty(),
            "AI backend loaded"
        );

        Ok(backend)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            AiBackend::Minimax(_) => ModelKind::Minimax,
            AiBackend::Search(_) => ModelKind::Search,
        }
    }
}

impl EngineAdapter for AiBackend {
    fn name(&self) -> &'static str {
        match self {
            AiBackend::Minimax(backend) => backend.name(),
            AiBackend::Search(backend) => backend.name(),
        }
    }

    fn current_position(&self) -> String {
        match self {
            AiBackend::Minimax(backend) => backend.current_position(),
            AiBackend::Search(backend) => backend.current_position(),
        }
    }

    fn apply_opponent_move(&mut self, from: &str, to: &str) -> Result<AppliedMove, EngineError> {
        match self {
            AiBackend::Minimax(backend) => backend.apply_opponent_move(from, to),
            AiBackend::Search(backend) => backend.apply_opponent_move(from, to),
        }
    }

    async fn compute_reply(&mut self) -> Result<Option<ReplyMove>, EngineError> {
        match self {
            AiBackend::Minimax(backend) => backend.compute_reply().await,
            AiBackend::Search(backend) => backend.compute_reply().await,
        }
    }

    fn undo_last_two_plies(&mut self) -> Result<bool, EngineError> {
        match self {
            AiBackend::Minimax(backend) => backend.undo_last_two_plies(),
            AiBackend::Search(backend) => backend.undo_last_two_plies(),
        }
    }

    fn set_strength(&mut self, strength: Strength) {
        match self {
            AiBackend::Minimax(backend) => backend.set_strength(strength),
            AiBackend::Search(backend) => backend.set_strength(strength),
        }
    }

    fn strength(&self) -> Strength {
        match self {
            AiBackend::Minimax(backend) => backend.strength(),
            AiBackend::Search(backend) => backend.strength(),
        }
    }

    fn status(&self) -> GameStatus {
        match self {
            AiBackend::Minimax(backend) => backend.status(),
            AiBackend::Search(backend) => backend.status(),
        }
    }
}
