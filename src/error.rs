//! Error taxonomy for game actions.
//!
//! Every failure is scoped to the single action that raised it; none is fatal
//! to the process.

use crate::llm::LlmError;
use crate::lock::LockError;
use crate::oracle::OracleError;
use crate::research::ResearchError;
use crate::store::StoreError;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Room, player or session mapping is gone (expired or deleted)
    #[error("{0} not found, please rejoin")]
    NotFound(String),

    /// Wrong phase, limit reached, duplicate action, invalid target
    #[error("{0}")]
    PreconditionFailed(String),

    /// Oracle or background lookup failed; nothing was written
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("the round is already starting")]
    LockContention,

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl GameError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        GameError::PreconditionFailed(msg.into())
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "NOT_FOUND",
            GameError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            GameError::Collaborator(_) => "COLLABORATOR_FAILURE",
            GameError::LockContention => "LOCK_CONTENTION",
            GameError::Store(_) => "STORE_FAILURE",
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => GameError::NotFound(key),
            other => GameError::Store(other),
        }
    }
}

impl From<LockError> for GameError {
    fn from(_: LockError) -> Self {
        GameError::LockContention
    }
}

impl From<OracleError> for GameError {
    fn from(err: OracleError) -> Self {
        GameError::Collaborator(err.to_string())
    }
}

impl From<ResearchError> for GameError {
    fn from(err: ResearchError) -> Self {
        GameError::Collaborator(err.to_string())
    }
}

impl From<LlmError> for GameError {
    fn from(err: LlmError) -> Self {
        GameError::Collaborator(err.to_string())
    }
}
