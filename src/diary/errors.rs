use thiserror::Error;

use crate::validation::ValidationError;

/// Reasons a reward-ladder operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    /// A gift threshold of zero would make every milestone computation meaningless.
    #[error("gift threshold must be a positive integer, got {0}")]
    InvalidThreshold(u32),

    /// Acknowledging a milestone the user has not reached yet.
    #[error("milestone {requested} not reached (deserved {deserved})")]
    MilestoneNotReached { requested: u32, deserved: u32 },
}

/// Reasons a pet lifecycle operation is refused. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PetError {
    #[error("unknown species: {0}")]
    InvalidSpecies(String),

    #[error("pet name cannot be empty")]
    EmptyName,

    #[error("pet name is too long (maximum {max} characters)")]
    NameTooLong { max: usize },

    #[error("an alive pet already exists")]
    PetAlreadyExists,

    #[error("user has no pet")]
    NoPet,

    #[error("pet is dead")]
    PetIsDead,

    #[error("no task is pending")]
    NoPendingTask,
}

/// Reasons a shop or outfit operation is refused. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShopError {
    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("unknown slot: {0}")]
    UnknownSlot(String),

    #[error("item already owned: {0}")]
    AlreadyOwned(String),

    #[error("item not owned: {0}")]
    NotOwned(String),

    #[error("insufficient stickers: price {price}, balance {balance}")]
    InsufficientFunds { price: u32, balance: u32 },

    #[error("user has no pet to dress")]
    NoPet,
}

/// Errors that can arise while operating on the diary document.
#[derive(Debug, Error)]
pub enum DiaryError {
    /// Wrapper around IO errors (data directory, lock file, uploads).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when the stored document carries an unexpected schema version.
    #[error("schema mismatch: expected {expected}, got {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reward(#[from] RewardError),

    #[error(transparent)]
    Pet(#[from] PetError),

    #[error(transparent)]
    Shop(#[from] ShopError),

    /// Duplicate registration or a stale whole-document replacement.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Blocked users and non-admin actors.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Internal error (task join errors, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl DiaryError {
    /// True for refusals caused by the caller (bad input or invalid state), as
    /// opposed to environment failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DiaryError::Validation(_)
                | DiaryError::Reward(_)
                | DiaryError::Pet(_)
                | DiaryError::Shop(_)
                | DiaryError::Conflict(_)
                | DiaryError::PermissionDenied(_)
                | DiaryError::NotFound(_)
        )
    }
}
