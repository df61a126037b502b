use thiserror::Error;

use crate::services::PersistenceError;

/// Why a matching run ended in the error state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchingError {
    #[error("Startup not found: {0}")]
    ProfileNotFound(String),

    #[error("Failed to load startup {startup_id}: {message}")]
    ProfileLoad { startup_id: String, message: String },

    #[error("Failed to fetch investor pool: {0}")]
    PoolFetch(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl MatchingError {
    /// Prior matches may have been removed without replacement
    pub fn left_partial_state(&self) -> bool {
        matches!(self, MatchingError::Persistence(e) if e.is_partial())
    }
}
