use crate::errors::RulesError;
use crate::rules::{self, AppliedMove, GameStatus};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};

/// A game in progress: the current position plus every earlier position, so
/// moves can be taken back and repetitions detected.
#[derive(Debug, Clone, Default)]
pub struct Game {
    position: Chess,
    history: Vec<Chess>,
}

impl Game {
    /// Standard starting position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes a game from a FEN string. Empty text means a fresh game, which
    /// is what callers pass when there is no game to carry over.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let fen = fen.trim();
        if fen.is_empty() {
            return Ok(Self::new());
        }

        let parsed: Fen = fen
            .parse()
            .map_err(|err| RulesError::InvalidFen(format!("{fen}: {err}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|err| RulesError::InvalidFen(format!("{fen}: {err}")))?;

        Ok(Self {
            position,
            history: Vec::new(),
        })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Plies played since this game was created or resumed.
    pub fn plies(&self) -> usize {
        self.history.len()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.position.legal_moves().into_iter().collect()
    }

    /// Plays the move a piece makes between two squares, as reported by a
    /// board UI. The position is untouched when the move is rejected.
    pub fn play_squares(&mut self, from: &str, to: &str) -> Result<AppliedMove, RulesError> {
        let from_sq = rules::parse_square(from)?;
        let to_sq = rules::parse_square(to)?;

        let m = rules::find_move(&self.position, from_sq, to_sq).ok_or_else(|| {
            RulesError::IllegalMove {
                from: from.to_string(),
                to: to.to_string(),
            }
        })?;

        self.play(&m)
    }

    pub fn play(&mut self, m: &Move) -> Result<AppliedMove, RulesError> {
        let (from, to, uci) = rules::move_squares(m);
        let next = self
            .position
            .clone()
            .play(m)
            .map_err(|_| RulesError::IllegalMove {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        let applied = AppliedMove {
            from,
            to,
            promotion: m.promotion(),
            captured: m.capture(),
            check: next.is_check(),
            checkmate: next.is_checkmate(),
            uci: uci.to_string(),
        };

        let previous = std::mem::replace(&mut self.position, next);
        self.history.push(previous);
        Ok(applied)
    }

    /// Takes back `plies` half-moves. Returns `false` and leaves the game
    /// unchanged when fewer than that many have been played.
    pub fn undo_plies(&mut self, plies: usize) -> bool {
        if plies == 0 || self.history.len() < plies {
            return false;
        }

        let keep = self.history.len() - plies;
        let mut dropped = self.history.split_off(keep);
        if let Some(restored) = dropped.drain(..).next() {
            self.position = restored;
        }
        true
    }

    pub fn status(&self) -> GameStatus {
        match rules::status_of(&self.position) {
            GameStatus::NotOver if self.is_threefold_repetition() => GameStatus::Draw,
            status => status,
        }
    }

    fn is_threefold_repetition(&self) -> bool {
        let seen = self
            .history
            .iter()
            .filter(|earlier| same_position(earlier, &self.position))
            .count();
        seen >= 2
    }
}

fn same_position(a: &Chess, b: &Chess) -> bool {
    a.turn() == b.turn()
        && a.board() == b.board()
        && a.castles().castling_rights() == b.castles().castling_rights()
        && a.ep_square(EnPassantMode::Legal) == b.ep_square(EnPassantMode::Legal)
}
