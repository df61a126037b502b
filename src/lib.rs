//! Pythh Match - startup/investor matching service
//!
//! Scores a startup against a bounded pool of investors with a fixed additive
//! rubric (sector overlap, stage fit), keeps the best qualifying investors and
//! replaces the startup's stored match set with them.

pub mod config;
pub mod core;
pub mod engine;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{calculate_match_score, rank_matches, Matcher, MatchComputation};
pub use engine::{MatchingEngine, MatchingError, RunReport, RunState, RunTrigger};
pub use models::{InvestorProfile, MatchRecord, MatchTier, ScoringRubric, StartupProfile};
