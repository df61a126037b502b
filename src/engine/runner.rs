use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::Matcher;
use crate::engine::{
    error::MatchingError,
    lock::RunLocks,
    state::{RunState, RunTrigger},
};
use crate::models::{InvestorProfile, MatchRecord};
use crate::services::{InvestorDirectory, MatchStore, StartupDirectory};

/// Outcome of one matching run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub startup_id: String,
    pub trigger: RunTrigger,
    /// Terminal state: `Done` or `Error`
    pub state: RunState,
    pub pool_size: usize,
    pub qualified: usize,
    /// Records written (or that would have been written, on error)
    pub matches: Vec<MatchRecord>,
    /// Whether a replace was attempted
    pub persisted: bool,
    pub error: Option<MatchingError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }
}

/// A stored match joined with investor details
#[derive(Debug, Clone)]
pub struct MatchedInvestor {
    pub record: MatchRecord,
    pub investor: InvestorProfile,
}

/// Engine construction options
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Upper bound on the investor pool snapshot
    pub pool_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { pool_limit: 200 }
    }
}

/// Runs the fetch → score → persist pipeline for one startup at a time
///
/// Each run is a full recompute. Runs for the same startup are serialized
/// by a per-startup lock; the pool is treated as a read-only snapshot.
pub struct MatchingEngine {
    startups: Arc<dyn StartupDirectory>,
    investors: Arc<dyn InvestorDirectory>,
    store: Arc<dyn MatchStore>,
    matcher: Matcher,
    options: EngineOptions,
    locks: RunLocks,
    status: Mutex<HashMap<String, RunState>>,
    auto_triggered: Mutex<HashSet<String>>,
}

/// Tracks state transitions for one run
struct RunTracker<'a> {
    engine: &'a MatchingEngine,
    startup_id: &'a str,
    state: RunState,
}

impl<'a> RunTracker<'a> {
    async fn enter(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "Unexpected run transition for {}: {} -> {}",
                self.startup_id, self.state, next
            );
        }
        debug!("Run {}: {} -> {}", self.startup_id, self.state, next);
        self.state = next;
        self.engine
            .status
            .lock()
            .await
            .insert(self.startup_id.to_string(), next);
    }
}

impl MatchingEngine {
    pub fn new(
        startups: Arc<dyn StartupDirectory>,
        investors: Arc<dyn InvestorDirectory>,
        store: Arc<dyn MatchStore>,
        matcher: Matcher,
        options: EngineOptions,
    ) -> Self {
        Self {
            startups,
            investors,
            store,
            matcher,
            options,
            locks: RunLocks::new(),
            status: Mutex::new(HashMap::new()),
            auto_triggered: Mutex::new(HashSet::new()),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Last observed state of the most recent run for a startup
    pub async fn run_status(&self, startup_id: &str) -> RunState {
        self.status
            .lock()
            .await
            .get(startup_id)
            .copied()
            .unwrap_or(RunState::Idle)
    }

    /// Recompute and replace the match set for a startup
    ///
    /// Never returns an error directly: failures end the run in
    /// [`RunState::Error`] and are carried in the report.
    pub async fn run_matching(&self, startup_id: &str, trigger: RunTrigger) -> RunReport {
        let _guard = self.locks.acquire(startup_id).await;
        let started_at = Utc::now();

        self.status
            .lock()
            .await
            .insert(startup_id.to_string(), RunState::Idle);
        let mut tracker = RunTracker {
            engine: self,
            startup_id,
            state: RunState::Idle,
        };

        let mut report = RunReport {
            startup_id: startup_id.to_string(),
            trigger,
            state: RunState::Idle,
            pool_size: 0,
            qualified: 0,
            matches: Vec::new(),
            persisted: false,
            error: None,
            started_at,
            finished_at: started_at,
        };

        info!("Starting matching run for {} ({:?})", startup_id, trigger);

        let outcome = self.execute(&mut tracker, &mut report).await;

        match outcome {
            Ok(()) => {
                tracker.enter(RunState::Done).await;
                info!(
                    "Matching run for {} finished: {} matches from {} investors",
                    startup_id,
                    report.matches.len(),
                    report.pool_size
                );
            }
            Err(e) => {
                tracker.enter(RunState::Error).await;
                if e.left_partial_state() {
                    error!(
                        "Matching run for {} failed after clearing old matches: {}",
                        startup_id, e
                    );
                } else {
                    error!("Matching run for {} failed: {}", startup_id, e);
                }
                report.error = Some(e);
            }
        }

        report.state = tracker.state;
        report.finished_at = Utc::now();
        report
    }

    async fn execute(
        &self,
        tracker: &mut RunTracker<'_>,
        report: &mut RunReport,
    ) -> Result<(), MatchingError> {
        let startup_id = report.startup_id.clone();

        let startup = self
            .startups
            .fetch_startup_profile(&startup_id)
            .await
            .map_err(|e| MatchingError::ProfileLoad {
                startup_id: startup_id.clone(),
                message: e.to_string(),
            })?
            .ok_or_else(|| MatchingError::ProfileNotFound(startup_id.clone()))?;

        tracker.enter(RunState::FetchingPool).await;

        let pool = self
            .investors
            .fetch_investor_pool(self.options.pool_limit)
            .await
            .map_err(|e| MatchingError::PoolFetch(e.to_string()))?;

        report.pool_size = pool.len();

        if pool.is_empty() {
            warn!("No investors found; keeping existing matches for {}", startup_id);
            return Ok(());
        }

        tracker.enter(RunState::Scoring).await;

        let computation = self.matcher.compute_matches(&startup, &pool);
        report.qualified = computation.qualified;
        report.matches = computation.matches;

        debug!(
            "Scored {} investors for {}: {} qualified, keeping {}",
            computation.pool_size,
            startup_id,
            computation.qualified,
            report.matches.len()
        );

        tracker.enter(RunState::Persisting).await;

        report.persisted = true;
        self.store
            .replace_matches(&startup_id, &report.matches)
            .await?;

        Ok(())
    }

    /// Whether the startup directory has a profile for this id
    pub async fn startup_exists(&self, startup_id: &str) -> Result<bool, MatchingError> {
        self.startups
            .fetch_startup_profile(startup_id)
            .await
            .map(|profile| profile.is_some())
            .map_err(|e| MatchingError::ProfileLoad {
                startup_id: startup_id.to_string(),
                message: e.to_string(),
            })
    }

    /// Run matching once for a startup seen with zero matches
    ///
    /// Returns `None` when an automatic run was already started for this
    /// startup in this process.
    pub async fn auto_match_once(&self, startup_id: &str) -> Option<RunReport> {
        {
            let mut triggered = self.auto_triggered.lock().await;
            if !triggered.insert(startup_id.to_string()) {
                debug!("Automatic matching already triggered for {}", startup_id);
                return None;
            }
        }

        Some(self.run_matching(startup_id, RunTrigger::Automatic).await)
    }

    /// Stored matches for a startup joined with investor details
    ///
    /// Matches whose investor is no longer in the directory are dropped.
    pub async fn matches_for(
        &self,
        startup_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchedInvestor>, MatchingError> {
        let records = self.store.list_matches(startup_id, limit).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|r| r.investor_id.clone()).collect();
        let investors = self
            .investors
            .fetch_investors(&ids)
            .await
            .map_err(|e| MatchingError::PoolFetch(e.to_string()))?;

        let by_id: HashMap<&str, &InvestorProfile> =
            investors.iter().map(|i| (i.id.as_str(), i)).collect();

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let investor = by_id.get(record.investor_id.as_str())?;
                Some(MatchedInvestor {
                    investor: (*investor).clone(),
                    record,
                })
            })
            .collect())
    }
}
