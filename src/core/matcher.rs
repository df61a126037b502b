use std::sync::Arc;

use crate::core::{
    normalizer::{pair_signals, AcronymSimilarity, NormalizedStartup, SimilarityPredicate},
    ranker::{rank_matches, InvestorScore},
    scoring::calculate_match_score,
};
use crate::models::{InvestorProfile, MatchRecord, ScoringRubric, StartupProfile};

/// Result of scoring one startup against a pool
#[derive(Debug, Clone)]
pub struct MatchComputation {
    pub matches: Vec<MatchRecord>,
    pub pool_size: usize,
    /// Investors at or above the minimum score, before truncation
    pub qualified: usize,
}

/// Main matching orchestrator - runs the three-stage pipeline
///
/// # Pipeline Stages
/// 1. Normalize startup and investor labels into pair signals
/// 2. Score each pair against the rubric
/// 3. Filter, rank and truncate
///
/// Pure and synchronous: no I/O, no shared state.
#[derive(Clone)]
pub struct Matcher {
    rubric: ScoringRubric,
    predicate: Arc<dyn SimilarityPredicate>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").field("rubric", &self.rubric).finish()
    }
}

impl Matcher {
    pub fn new(rubric: ScoringRubric) -> Self {
        Self {
            rubric,
            predicate: Arc::new(AcronymSimilarity),
        }
    }

    pub fn with_default_rubric() -> Self {
        Self::new(ScoringRubric::default())
    }

    /// Swap the label comparator without touching the scorer
    pub fn with_predicate(mut self, predicate: Arc<dyn SimilarityPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn rubric(&self) -> &ScoringRubric {
        &self.rubric
    }

    /// Score every investor in `pool` for `startup`
    pub fn score_pool(
        &self,
        startup: &StartupProfile,
        pool: &[InvestorProfile],
    ) -> Vec<InvestorScore> {
        let normalized = NormalizedStartup::from_profile(startup);

        pool.iter()
            .map(|investor| {
                let signals = pair_signals(&normalized, investor, self.predicate.as_ref());
                InvestorScore {
                    investor_id: investor.id.clone(),
                    score: calculate_match_score(&signals, &self.rubric),
                }
            })
            .collect()
    }

    /// Compute the ranked match set for a startup
    ///
    /// # Arguments
    /// * `startup` - The startup being matched
    /// * `pool` - Investor snapshot, in directory order
    ///
    /// # Returns
    /// MatchComputation with at most `top_n` records, best first
    pub fn compute_matches(
        &self,
        startup: &StartupProfile,
        pool: &[InvestorProfile],
    ) -> MatchComputation {
        let scores = self.score_pool(startup, pool);
        let qualified = scores
            .iter()
            .filter(|s| s.score >= self.rubric.min_score)
            .count();

        MatchComputation {
            matches: rank_matches(&startup.id, scores, &self.rubric),
            pool_size: pool.len(),
            qualified,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_rubric()
    }
}
