//! In-process alpha-beta opponent.
//!
//! A plain negamax search with alpha-beta pruning over the legal moves of the
//! embedded rules library. The search runs on tokio's blocking pool so a deep
//! search never stalls the connection tasks sharing the runtime.

use crate::errors::EngineError;
use crate::{EngineAdapter, ReplyMove, Strength};
use gambit_engine::game::Game;
use gambit_engine::rules::{AppliedMove, GameStatus};
use shakmaty::{Chess, Color, Move, Piece, Position, Role};
use std::cmp::Reverse;

/// Score of being checkmated at the root. Mates found closer to the root
/// score further from zero.
pub const MATE_SCORE: i32 = 100_000;

const CENTRE_WEIGHT: i32 = 4;

/// Deterministic minimax opponent.
///
/// # Example
///
/// ```rust
/// use gambit_ai::{EngineAdapter, MinimaxBackend, Strength};
///
/// let mut ai = MinimaxBackend::new(Strength::new(0));
/// ai.apply_opponent_move("e2", "e4").expect("legal");
/// assert!(ai.current_position().contains(" b "));
/// ```
#[derive(Debug, Clone)]
pub struct MinimaxBackend {
    game: Game,
    strength: Strength,
}

impl MinimaxBackend {
    pub fn new(strength: Strength) -> Self {
        Self {
            game: Game::new(),
            strength,
        }
    }

    /// Resumes from a FEN string; empty text starts a new game.
    pub fn from_position(strength: Strength, seed_fen: &str) -> Result<Self, EngineError> {
        Ok(Self {
            game: Game::from_fen(seed_fen)?,
            strength,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }
}

impl EngineAdapter for MinimaxBackend {
    fn name(&self) -> &'static str {
        "minimax"
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

        let position = self.game.position().clone();
        let depth = self.strength.minimax_depth();
        let chosen = tokio::task::spawn_blocking(move || best_move(&position, depth))
            .await
            .map_err(|err| EngineError::Search(err.to_string()))?;

        let Some(m) = chosen else {
            return Ok(None);
        };

        let applied = self.game.play(&m)?;
        tracing::trace!(uci = %applied.uci, depth, "minimax reply");
        Ok(Some(ReplyMove::new(&applied, self.game.status())))
    }

    fn undo_last_two_plies(&mut self) -> Result<bool, EngineError> {
        Ok(self.game.undo_plies(2))
    }

    fn set_strength(&mut self, strength: Strength) {
        self.strength = strength;
    }

    fn strength(&self) -> Strength {
        self.strength
    }

    fn status(&self) -> GameStatus {
        self.game.status()
    }
}

/// Best move for the side to move, searching `depth` plies. `None` when there
/// are no legal moves.
pub fn best_move(pos: &Chess, depth: u8) -> Option<Move> {
    let moves = ordered_moves(pos);
    let mut best: Option<(Move, i32)> = None;
    let mut alpha = -MATE_SCORE - 1;
    let beta = MATE_SCORE + 1;

    for m in moves {
        let mut child = pos.clone();
        child.play_unchecked(&m);
        let score = -negamax(&child, depth.saturating_sub(1), -beta, -alpha, 1);

        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((m, score));
        }
        alpha = alpha.max(score);
    }

    best.map(|(m, _)| m)
}

fn negamax(pos: &Chess, depth: u8, mut alpha: i32, beta: i32, ply: i32) -> i32 {
    let moves = ordered_moves(pos);
    if moves.is_empty() {
        return if pos.is_check() { -(MATE_SCORE - ply) } else { 0 };
    }
    if pos.is_insufficient_material() {
        return 0;
    }
    if depth == 0 {
        return evaluate(pos);
    }

    for m in moves {
        let mut child = pos.clone();
        child.play_unchecked(&m);
        let score = -negamax(&child, depth - 1, -beta, -alpha, ply + 1);
        if score >= beta {
            return beta;
        }
        alpha = alpha.max(score);
    }
    alpha
}

/// Legal moves, captures of valuable pieces by cheap ones first. The sort is
/// stable so equal keys keep generation order.
fn ordered_moves(pos: &Chess) -> Vec<Move> {
    let mut moves: Vec<Move> = pos.legal_moves().into_iter().collect();
    moves.sort_by_key(|m| Reverse(order_key(m)));
    moves
}

fn order_key(m: &Move) -> i32 {
    let capture = m
        .capture()
        .map(|victim| role_value(victim) * 10 - role_value(m.role()))
        .unwrap_or(0);
    let promotion = m.promotion().map(role_value).unwrap_or(0);
    capture + promotion
}

/// Static score from the point of view of the side to move.
fn evaluate(pos: &Chess) -> i32 {
    let white = side_score(pos, Color::White);
    let black = side_score(pos, Color::Black);
    match pos.turn() {
        Color::White => white - black,
        Color::Black => black - white,
    }
}

fn side_score(pos: &Chess, color: Color) -> i32 {
    let board = pos.board();
    let mut score = 0;

    for role in [
        Role::Pawn,
        Role::Knight,
        Role::Bishop,
        Role::Rook,
        Role::Queen,
    ] {
        let pieces = board.by_piece(Piece { color, role });
        score += role_value(role) * pieces.count() as i32;

        if matches!(role, Role::Pawn | Role::Knight | Role::Bishop) {
            for square in pieces {
                score += CENTRE_WEIGHT * centrality(u32::from(square));
            }
        }
    }

    score
}

/// 6 on the four centre squares, 0 in the corners.
fn centrality(index: u32) -> i32 {
    let file = (index % 8) as i32;
    let rank = (index / 8) as i32;
    let file_distance = (3 - file).max(file - 4);
    let rank_distance = (3 - rank).max(rank - 4);
    6 - file_distance - rank_distance
}

fn role_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 100,
        Role::Knight => 320,
        Role::Bishop => 330,
        Role::Rook => 500,
        Role::Queen => 900,
        Role::King => 0,
    }
}
