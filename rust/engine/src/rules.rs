use crate::errors::RulesError;
use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, Move, Outcome, Position, Role, Square};

/// Result of a game from the point of view of the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    NotOver,
    WhiteWin,
    BlackWin,
    Draw,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::NotOver
    }
}

/// A move that the rules accepted, with the metadata a caller needs to
/// report it (captured piece, check, checkmate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
    pub captured: Option<Role>,
    pub check: bool,
    pub checkmate: bool,
    pub uci: String,
}

/// Parses a square name such as `e2`. Surrounding whitespace and upper case
/// file letters are accepted.
///
/// # Examples
///
/// ```
/// use gambit_engine::rules::parse_square;
/// use shakmaty::Square;
///
/// assert_eq!(parse_square("e2"), Ok(Square::E2));
/// assert_eq!(parse_square(" H8 "), Ok(Square::H8));
/// assert!(parse_square("i9").is_err());
/// ```
pub fn parse_square(text: &str) -> Result<Square, RulesError> {
    text.trim()
        .to_ascii_lowercase()
        .parse::<Square>()
        .map_err(|_| RulesError::InvalidSquare(text.to_string()))
}

/// Finds the legal move that takes a piece from `from` to `to`.
///
/// Board front-ends only report the two squares a piece was dragged between,
/// so this resolves the rest:
/// - a king moving two files is castling,
/// - a pawn reaching the last rank promotes to a queen,
/// - a diagonal pawn move onto the en passant square captures en passant.
///
/// Returns `None` when no legal move matches.
///
/// # Examples
///
/// ```
/// use gambit_engine::rules::find_move;
/// use shakmaty::{Chess, Square};
///
/// let pos = Chess::default();
/// assert!(find_move(&pos, Square::E2, Square::E4).is_some());
/// assert!(find_move(&pos, Square::E2, Square::E5).is_none());
/// ```
pub fn find_move(pos: &Chess, from: Square, to: Square) -> Option<Move> {
    let plain = UciMove::Normal {
        from,
        to,
        promotion: None,
    };
    if let Ok(m) = plain.to_move(pos) {
        return Some(m);
    }

    let promoting = UciMove::Normal {
        from,
        to,
        promotion: Some(Role::Queen),
    };
    promoting.to_move(pos).ok()
}

/// Squares a move travels between, in standard (non-960) UCI notation so that
/// castling reads as `e1g1` rather than king-takes-rook.
pub fn move_squares(m: &Move) -> (Square, Square, UciMove) {
    let uci = m.to_uci(CastlingMode::Standard);
    let (from, to) = match uci {
        UciMove::Normal { from, to, .. } => (from, to),
        _ => (m.from().unwrap_or_else(|| m.to()), m.to()),
    };
    (from, to, uci)
}

/// Outcome that can be read off a single position: checkmate, stalemate and
/// insufficient material. The fifty-move rule is applied automatically.
/// Repetition needs game history and is handled by [`crate::game::Game`].
pub fn status_of(pos: &Chess) -> GameStatus {
    match pos.outcome() {
        Some(Outcome::Decisive {
            winner: Color::White,
        }) => GameStatus::WhiteWin,
        Some(Outcome::Decisive {
            winner: Color::Black,
        }) => GameStatus::BlackWin,
        Some(Outcome::Draw) => GameStatus::Draw,
        None if pos.halfmoves() >= 100 => GameStatus::Draw,
        None => GameStatus::NotOver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::fen::Fen;

    fn position(fen: &str) -> Chess {
        fen.parse::<Fen>()
            .expect("fen")
            .into_position(CastlingMode::Standard)
            .expect("legal position")
    }

    #[test]
    fn king_two_files_is_castling() {
        let pos = position("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let m = find_move(&pos, Square::E1, Square::G1).expect("castle short");
        assert!(m.is_castle());

        let (from, to, uci) = move_squares(&m);
        assert_eq!((from, to), (Square::E1, Square::G1));
        assert_eq!(uci.to_string(), "e1g1");
    }

    #[test]
    fn last_rank_pawn_promotes_to_queen() {
        let pos = position("8/P7/8/8/8/8/8/k6K w - - 0 1");
        let m = find_move(&pos, Square::A7, Square::A8).expect("promotion");
        assert_eq!(m.promotion(), Some(Role::Queen));
    }

    #[test]
    fn en_passant_is_found_from_squares() {
        let pos = position("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2");
        let m = find_move(&pos, Square::E5, Square::D6).expect("en passant");
        assert!(m.is_en_passant());
        assert_eq!(m.capture(), Some(Role::Pawn));
    }

    #[test]
    fn status_reports_checkmate_winner() {
        let mated = position("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert_eq!(status_of(&mated), GameStatus::BlackWin);
        assert!(status_of(&mated).is_over());
    }

    #[test]
    fn status_reports_stalemate_and_bare_kings_as_draw() {
        let stalemate = position("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert_eq!(status_of(&stalemate), GameStatus::Draw);

        let bare = position("8/8/4k3/8/8/4K3/8/8 w - - 0 1");
        assert_eq!(status_of(&bare), GameStatus::Draw);
    }

    #[test]
    fn fifty_move_rule_is_a_draw() {
        let pos = position("4k3/8/8/8/8/8/R7/4K3 w - - 100 80");
        assert_eq!(status_of(&pos), GameStatus::Draw);
    }

    #[test]
    fn status_serializes_in_camel_case() {
        let json = serde_json::to_string(&GameStatus::WhiteWin).expect("serialize");
        assert_eq!(json, "\"whiteWin\"");
        let json = serde_json::to_string(&GameStatus::NotOver).expect("serialize");
        assert_eq!(json, "\"notOver\"");
    }
}
