use std::sync::Arc;

use crate::services::kv::{KeyValueStore, KvError, StoreKey};

/// Outcome of asking for a re-match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchDecision {
    Allowed { remaining: u32 },
    Exhausted { used: u32 },
}

/// Per-startup quota of free re-matches
///
/// Enforced by callers before a re-match run; the matching engine itself
/// does not rate limit.
pub struct RematchLimiter {
    store: Arc<dyn KeyValueStore>,
    max_free: u32,
}

impl RematchLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, max_free: u32) -> Self {
        Self { store, max_free }
    }

    pub fn max_free(&self) -> u32 {
        self.max_free
    }

    /// Re-matches used so far
    pub async fn used(&self, startup_id: &str) -> Result<u32, KvError> {
        let count = self
            .store
            .read_counter(&StoreKey::rematch_count(startup_id))
            .await?;
        Ok(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
    }

    pub async fn remaining(&self, startup_id: &str) -> Result<u32, KvError> {
        Ok(self.max_free.saturating_sub(self.used(startup_id).await?))
    }

    /// Consume one re-match if any are left
    ///
    /// The counter is incremented first so two concurrent requests cannot
    /// both slip under the limit.
    pub async fn try_consume(&self, startup_id: &str) -> Result<RematchDecision, KvError> {
        if self.used(startup_id).await? >= self.max_free {
            return Ok(RematchDecision::Exhausted { used: self.max_free });
        }

        let count = self
            .store
            .increment(&StoreKey::rematch_count(startup_id))
            .await?;
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);

        if count > self.max_free {
            tracing::info!("Re-match quota exhausted for startup {}", startup_id);
            return Ok(RematchDecision::Exhausted { used: self.max_free });
        }

        Ok(RematchDecision::Allowed {
            remaining: self.max_free - count,
        })
    }
}
