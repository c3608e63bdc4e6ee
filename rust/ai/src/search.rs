//! Opponent backed by an external UCI search engine such as Stockfish.
//!
//! The game itself is tracked locally so moves are validated before the
//! engine sees them and positions can be exported without asking the engine.

use crate::errors::EngineError;
use crate::uci::UciProcess;
use crate::{EngineAdapter, EngineOptions, ReplyMove, Strength};
use gambit_engine::game::Game;
use gambit_engine::rules::{AppliedMove, GameStatus};
use std::time::Duration;

const SKILL_OPTION: &str = "Skill Level";

#[derive(Debug)]
pub struct SearchBackend {
    game: Game,
    strength: Strength,
    strength_changed: bool,
    process: UciProcess,
    ready_timeout: Duration,
    move_timeout: Duration,
}

impl SearchBackend {
    /// Starts the engine and completes the UCI handshake. Nothing is returned
    /// until the engine has answered `readyok`.
    pub async fn launch(
        strength: Strength,
        seed_fen: &str,
        options: &EngineOptions,
    ) -> Result<Self, EngineError> {
        let game = Game::from_fen(seed_fen)?;
        let mut process = UciProcess::spawn(&options.search_path, &options.search_args)?;

        process.handshake(options.handshake_timeout).await?;
        process
            .set_option(SKILL_OPTION, strength.skill_level())
            .await?;
        process.send("ucinewgame").await?;
        process.ready(options.handshake_timeout).await?;

        tracing::info!(
            path = %options.search_path.display(),
            pid = ?process.id(),
            level = strength.level(),
            "search engine ready"
        );

        Ok(Self {
            game,
            strength,
            strength_changed: false,
            process,
            ready_timeout: options.handshake_timeout,
            move_timeout: options.move_timeout,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Sends `quit` and waits for nothing further.
    pub async fn shutdown(self) {
        self.process.quit().await;
    }
}

impl EngineAdapter for SearchBackend {
    fn name(&self) -> &'static str {
        "stockfish"
    }

    fn current_position(&self) -> String {
        self.game.fen()
    }

    fn apply_opponent_move(&mut self, from: &str, to: &str) -> Result<AppliedMove, EngineError> {
        Ok(self.game.play_squares(from, to)?)
    }

    async fn compute_reply(&mut self) -> Result<Option<ReplyMove>, EngineError> {
        if self.game.status().is_over() {
            return Ok(None);
        }

        if self.strength_changed {
            self.process
                .set_option(SKILL_OPTION, self.strength.skill_level())
                .await?;
            self.process.ready(self.ready_timeout).await?;
            self.strength_changed = false;
        }

        let fen = self.game.fen();
        self.process.send(&format!("position fen {fen}")).await?;
        let Some(uci) = self
            .process
            .best_move(self.strength.search_depth(), self.move_timeout)
            .await?
        else {
            return Ok(None);
        };

        let m = uci.to_move(self.game.position()).map_err(|_| {
            EngineError::Protocol(format!("engine proposed illegal move {uci} in {fen}"))
        })?;
        let applied = self.game.play(&m)?;
        Ok(Some(ReplyMove::new(&applied, self.game.status())))
    }

    fn undo_last_two_plies(&mut self) -> Result<bool, EngineError> {
        Ok(self.game.undo_plies(2))
    }

    fn set_strength(&mut self, strength: Strength) {
        if strength != self.strength {
            self.strength = strength;
            self.strength_changed = true;
        }
    }

    fn strength(&self) -> Strength {
        self.strength
    }

    fn status(&self) -> GameStatus {
        self.game.status()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const REPLIES_E5: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name scripted"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "info depth 1 score cp 0"; echo "bestmove e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;

    const NO_MOVE: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "bestmove (none)" ;;
  esac
done
"#;

    fn scripted(script: &str) -> EngineOptions {
        EngineOptions {
            search_path: PathBuf::from("sh"),
            search_args: vec!["-c".to_string(), script.to_string()],
            handshake_timeout: Duration::from_secs(5),
            move_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn plays_the_engine_best_move() {
        let mut backend = SearchBackend::launch(Strength::new(2), "", &scripted(REPLIES_E5))
            .await
            .expect("launch");

        backend.apply_opponent_move("e2", "e4").expect("legal");
        let reply = backend.compute_reply().await.expect("reply").expect("move");

        assert_eq!(reply.uci, "e7e5");
        assert_eq!((reply.from.as_str(), reply.to.as_str()), ("e7", "e5"));
        assert_eq!(backend.game().plies(), 2);
    }

    #[tokio::test]
    async fn strength_change_is_applied_before_the_next_search() {
        let mut backend = SearchBackend::launch(Strength::new(0), "", &scripted(REPLIES_E5))
            .await
            .expect("launch");

        backend.set_strength(Strength::new(5));
        assert!(backend.strength_changed);
        backend.apply_opponent_move("e2", "e4").expect("legal");
        backend.compute_reply().await.expect("reply");

        assert!(!backend.strength_changed);
        assert_eq!(backend.strength(), Strength::new(5));
    }

    #[tokio::test]
    async fn none_means_no_reply() {
        let mut backend = SearchBackend::launch(Strength::default(), "", &scripted(NO_MOVE))
            .await
            .expect("launch");

        backend.apply_opponent_move("d2", "d4").expect("legal");
        assert!(backend.compute_reply().await.expect("reply").is_none());
    }

    #[tokio::test]
    async fn illegal_suggestion_is_a_protocol_error() {
        let mut backend = SearchBackend::launch(Strength::default(), "", &scripted(REPLIES_E5))
            .await
            .expect("launch");

        // White to move: e7e5 is not legal here.
        let err = backend.compute_reply().await.unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
        assert_eq!(backend.game().plies(), 0);
    }

    #[tokio::test]
    async fn seed_position_is_kept() {
        let seed = "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1";
        let backend = SearchBackend::launch(Strength::default(), seed, &scripted(REPLIES_E5))
            .await
            .expect("launch");
        assert_eq!(backend.current_position(), seed);
        backend.shutdown().await;
    }

    #[tokio::test]
    async fn exiting_engine_fails_the_launch() {
        let err = SearchBackend::launch(Strength::default(), "", &scripted("exit 0"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Handshake(_) | EngineError::Io(_)));
    }

    #[tokio::test]
    #[ignore = "needs a stockfish binary on PATH"]
    async fn real_stockfish_answers() {
        let mut backend = SearchBackend::launch(Strength::new(0), "", &EngineOptions::default())
            .await
            .expect("stockfish on PATH");
        backend.apply_opponent_move("e2", "e4").expect("legal");
        let reply = backend.compute_reply().await.expect("reply");
        assert!(reply.is_some());
    }
}
