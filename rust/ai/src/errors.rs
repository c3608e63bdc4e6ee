use gambit_engine::errors::RulesError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown AI model: {0:?}")]
    UnknownModel(String),
    #[error("Failed to start search engine `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Search engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Search engine did not finish the handshake: {0}")]
    Handshake(String),
    #[error("Search engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Search engine process exited")]
    ProcessExited,
    #[error("Search engine protocol error: {0}")]
    Protocol(String),
    #[error("Search task failed: {0}")]
    Search(String),
    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl EngineError {
    /// Errors caused by the move a player sent rather than by the backend.
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::Rules(_))
    }
}
