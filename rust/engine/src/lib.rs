//! # gambit-engine: Chess Rules Core
//!
//! A thin layer over the embedded [`shakmaty`] rules library. It turns the
//! square pairs a board UI reports into legal moves, keeps the history needed
//! to take moves back, and reports whether a game is over.
//!
//! ## Core Modules
//!
//! - [`game`] - [`Game`](game::Game): position, move history, undo, status
//! - [`rules`] - Square parsing, move resolution and single-position outcomes
//! - [`errors`] - Error types for rejected input
//!
//! ## Quick Start
//!
//! ```rust
//! use gambit_engine::game::Game;
//! use gambit_engine::rules::GameStatus;
//!
//! let mut game = Game::new();
//! game.play_squares("f2", "f3").expect("legal");
//! game.play_squares("e7", "e5").expect("legal");
//! game.play_squares("g2", "g4").expect("legal");
//! let mate = game.play_squares("d8", "h4").expect("legal");
//!
//! assert!(mate.checkmate);
//! assert_eq!(game.status(), GameStatus::BlackWin);
//! ```
//!
//! Rejected moves leave the game untouched:
//!
//! ```rust
//! use gambit_engine::errors::RulesError;
//! use gambit_engine::game::Game;
//!
//! let mut game = Game::new();
//! let before = game.fen();
//! let err = game.play_squares("e2", "e5").unwrap_err();
//! assert!(matches!(err, RulesError::IllegalMove { .. }));
//! assert_eq!(game.fen(), before);
//! ```

pub mod errors;
pub mod game;
pub mod rules;

pub use errors::RulesError;
pub use game::Game;
pub use rules::{AppliedMove, GameStatus};
