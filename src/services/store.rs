use async_trait::async_trait;
use thiserror::Error;

use crate::models::{InvestorProfile, MatchRecord, StartupProfile};

/// Errors from the profile/investor directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid service key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Errors from the match store
///
/// Delete and insert failures are kept apart so a caller can tell a
/// wiped-but-not-refilled match set from an untouched one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to delete existing matches for {startup_id}: {message}")]
    DeleteFailed { startup_id: String, message: String },

    #[error("Failed to insert matches for {startup_id}: {message}")]
    InsertFailed { startup_id: String, message: String },

    #[error("Transaction failed for {startup_id}: {message}")]
    TransactionFailed { startup_id: String, message: String },

    #[error("Failed to read matches for {startup_id}: {message}")]
    ReadFailed { startup_id: String, message: String },
}

impl PersistenceError {
    /// True when prior matches may already be gone
    pub fn is_partial(&self) -> bool {
        matches!(self, PersistenceError::InsertFailed { .. })
    }
}

/// Source of startup profiles
#[async_trait]
pub trait StartupDirectory: Send + Sync {
    /// `Ok(None)` when no startup has this id
    async fn fetch_startup_profile(
        &self,
        startup_id: &str,
    ) -> Result<Option<StartupProfile>, DirectoryError>;
}

/// Source of investor records
#[async_trait]
pub trait InvestorDirectory: Send + Sync {
    /// Snapshot of at most `limit` investors in a stable order.
    /// An empty directory is `Ok(vec![])`, not an error.
    async fn fetch_investor_pool(&self, limit: usize) -> Result<Vec<InvestorProfile>, DirectoryError>;

    /// Investors for the given ids; unknown ids are skipped
    async fn fetch_investors(&self, ids: &[String]) -> Result<Vec<InvestorProfile>, DirectoryError>;
}

/// Owner of the persisted match rows
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Drop every match for `startup_id`, then store `matches`
    async fn replace_matches(
        &self,
        startup_id: &str,
        matches: &[MatchRecord],
    ) -> Result<(), PersistenceError>;

    /// Stored matches for `startup_id`, best score first
    async fn list_matches(
        &self,
        startup_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_state_detection() {
        let insert = PersistenceError::InsertFailed {
            startup_id: "s".to_string(),
            message: "timeout".to_string(),
        };
        let delete = PersistenceError::DeleteFailed {
            startup_id: "s".to_string(),
            message: "timeout".to_string(),
        };

        assert!(insert.is_partial());
        assert!(!delete.is_partial());
        assert_eq!(
            insert.to_string(),
            "Failed to insert matches for s: timeout"
        );
    }
}
