//! In-process collaborators for embedding the engine without a backend, and for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{InvestorProfile, MatchRecord, StartupProfile};
use crate::services::store::{
    DirectoryError, InvestorDirectory, MatchStore, PersistenceError, StartupDirectory,
};

/// Startup and investor directory held in memory
#[derive(Default)]
pub struct MemoryDirectory {
    startups: RwLock<HashMap<String, StartupProfile>>,
    investors: RwLock<Vec<InvestorProfile>>,
    fail_pool: AtomicBool,
}

impl MemoryDirectory {
    pub fn new(startups: Vec<StartupProfile>, investors: Vec<InvestorProfile>) -> Self {
        Self {
            startups: RwLock::new(startups.into_iter().map(|s| (s.id.clone(), s)).collect()),
            investors: RwLock::new(investors),
            fail_pool: AtomicBool::new(false),
        }
    }

    pub async fn upsert_startup(&self, startup: StartupProfile) {
        self.startups.write().await.insert(startup.id.clone(), startup);
    }

    pub async fn set_investors(&self, investors: Vec<InvestorProfile>) {
        *self.investors.write().await = investors;
    }

    /// Make pool fetches fail until reset
    pub fn fail_pool_fetch(&self, fail: bool) {
        self.fail_pool.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StartupDirectory for MemoryDirectory {
    async fn fetch_startup_profile(
        &self,
        startup_id: &str,
    ) -> Result<Option<StartupProfile>, DirectoryError> {
        Ok(self.startups.read().await.get(startup_id).cloned())
    }
}

#[async_trait]
impl InvestorDirectory for MemoryDirectory {
    async fn fetch_investor_pool(&self, limit: usize) -> Result<Vec<InvestorProfile>, DirectoryError> {
        if self.fail_pool.load(Ordering::SeqCst) {
            return Err(DirectoryError::ApiError("investor directory unavailable".into()));
        }
        Ok(self.investors.read().await.iter().take(limit).cloned().collect())
    }

    async fn fetch_investors(&self, ids: &[String]) -> Result<Vec<InvestorProfile>, DirectoryError> {
        Ok(self
            .investors
            .read()
            .await
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }
}

/// Which step of a replace should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStep {
    Delete,
    Insert,
}

/// Match table held in memory
///
/// Replays the two-step delete-then-insert protocol so partial failures
/// leave the same state a remote store would.
#[derive(Default)]
pub struct MemoryMatchStore {
    rows: RwLock<Vec<MatchRecord>>,
    fail_step: RwLock<Option<FailStep>>,
    insert_delay: RwLock<Option<Duration>>,
    replace_calls: RwLock<usize>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, step: Option<FailStep>) {
        *self.fail_step.write().await = step;
    }

    /// Pause between the delete and the insert of every replace
    pub async fn delay_insert(&self, delay: Option<Duration>) {
        *self.insert_delay.write().await = delay;
    }

    /// Rows for one startup in insertion order
    pub async fn rows_for(&self, startup_id: &str) -> Vec<MatchRecord> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|r| r.startup_id == startup_id)
            .cloned()
            .collect()
    }

    pub async fn replace_calls(&self) -> usize {
        *self.replace_calls.read().await
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn replace_matches(
        &self,
        startup_id: &str,
        matches: &[MatchRecord],
    ) -> Result<(), PersistenceError> {
        *self.replace_calls.write().await += 1;
        let fail = *self.fail_step.read().await;

        if fail == Some(FailStep::Delete) {
            return Err(PersistenceError::DeleteFailed {
                startup_id: startup_id.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.rows.write().await.retain(|r| r.startup_id != startup_id);

        let delay = *self.insert_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail == Some(FailStep::Insert) {
            return Err(PersistenceError::InsertFailed {
                startup_id: startup_id.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.rows.write().await.extend(matches.iter().cloned());

        Ok(())
    }

    async fn list_matches(
        &self,
        startup_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, PersistenceError> {
        let mut rows = self.rows_for(startup_id).await;
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        rows.truncate(limit);
        Ok(rows)
    }
}
