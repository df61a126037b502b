// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{InvestorProfile, MatchRecord, MatchTier, ScoringRubric, StartupProfile};
pub use requests::{ListMatchesQuery, RunMatchingRequest};
pub use responses::{
    ErrorResponse, HealthResponse, ListMatchesResponse, MatchSummary, MatchedInvestorView,
    RunReportResponse, RunStatusResponse,
};
