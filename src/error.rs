use crate::model::UserId;
use thiserror::Error;

/// Failures reported by the store ports.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no pet state for user {0}")]
    NotFound(UserId),

    #[error("stale write for user {0}")]
    Conflict(UserId),

    #[error("store unavailable: {0}")]
    Transient(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Transient(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PetError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid food: {0}")]
    InvalidFood(u32),

    #[error("invalid game: {0}")]
    InvalidGame(String),

    #[error("no pet state for user {0}")]
    NotFoundState(UserId),

    #[error("concurrent update for user {0}, write retried and lost again")]
    ConcurrentUpdate(UserId),

    #[error("store error: {0}")]
    TransientStore(String),
}

impl From<StoreError> for PetError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(user) => PetError::NotFoundState(user),
            StoreError::Conflict(user) => PetError::ConcurrentUpdate(user),
            StoreError::Transient(msg) => PetError::TransientStore(msg),
        }
    }
}

pub type Result<T, E = PetError> = std::result::Result<T, E>;
