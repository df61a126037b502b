// Core algorithm exports
pub mod matcher;
pub mod normalizer;
pub mod ranker;
pub mod scoring;

pub use matcher::{Matcher, MatchComputation};
pub use normalizer::{normalize, AcronymSimilarity, PairSignals, SimilarityPredicate, SubstringSimilarity};
pub use ranker::{rank_matches, InvestorScore};
pub use scoring::calculate_match_score;
