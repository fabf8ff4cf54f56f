use thiserror::Error;
use uuid::Uuid;

/// Failure inside a [`Store`](crate::db::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// A write the schema's constraints would reject.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// Fault raised on purpose by the in-memory store.
    #[error("injected fault at {0}")]
    Injected(&'static str),
}

/// Domain error surfaced by every core operation.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub type GameResult<T> = Result<T, GameError>;

impl GameError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GameError::InvalidRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        GameError::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        GameError::NotFound { entity, id }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidRequest(_) => "bad_request",
            GameError::NotFound { .. } => "not_found",
            GameError::Conflict(_) => "conflict",
            GameError::Storage(_) => "internal_error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            GameError::InvalidRequest(_) => 400,
            GameError::NotFound { .. } => 404,
            GameError::Conflict(_) => 409,
            GameError::Storage(_) => 500,
        }
    }

    /// Message safe to show a client. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            GameError::Storage(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}
