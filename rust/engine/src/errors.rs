use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("Invalid square: {0:?}")]
    InvalidSquare(String),
    #[error("Invalid position: {0}")]
    InvalidFen(String),
    #[error("Illegal move from {from} to {to}")]
    IllegalMove { from: String, to: String },
}
