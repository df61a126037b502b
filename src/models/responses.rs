use serde::{Deserialize, Serialize};

use crate::engine::{MatchedInvestor, RunReport, RunState, RunTrigger};
use crate::models::domain::{MatchRecord, MatchTier};

/// One ranked match in a run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    #[serde(rename = "investorId")]
    pub investor_id: String,
    pub score: u8,
    pub tier: MatchTier,
}

impl From<&MatchRecord> for MatchSummary {
    fn from(record: &MatchRecord) -> Self {
        Self {
            investor_id: record.investor_id.clone(),
            score: record.score,
            tier: MatchTier::from_score(record.score),
        }
    }
}

/// Response for run and re-match endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReportResponse {
    #[serde(rename = "startupId")]
    pub startup_id: String,
    pub trigger: RunTrigger,
    pub state: RunState,
    pub message: String,
    #[serde(rename = "poolSize")]
    pub pool_size: usize,
    pub qualified: usize,
    pub persisted: bool,
    pub matches: Vec<MatchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "partialState")]
    pub partial_state: bool,
    #[serde(rename = "remainingRematches", skip_serializing_if = "Option::is_none")]
    pub remaining_rematches: Option<u32>,
    #[serde(rename = "durationMs")]
    pub duration_ms: i64,
}

impl From<&RunReport> for RunReportResponse {
    fn from(report: &RunReport) -> Self {
        let message = if report.is_success() && report.pool_size == 0 {
            "No investors found".to_string()
        } else {
            report.state.status_message().to_string()
        };

        Self {
            startup_id: report.startup_id.clone(),
            trigger: report.trigger,
            state: report.state,
            message,
            pool_size: report.pool_size,
            qualified: report.qualified,
            persisted: report.persisted,
            matches: report.matches.iter().map(MatchSummary::from).collect(),
            error: report.error.as_ref().map(|e| e.to_string()),
            partial_state: report
                .error
                .as_ref()
                .is_some_and(|e| e.left_partial_state()),
            remaining_rematches: None,
            duration_ms: (report.finished_at - report.started_at).num_milliseconds(),
        }
    }
}

/// A stored match with investor display data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedInvestorView {
    #[serde(rename = "investorId")]
    pub investor_id: String,
    pub name: Option<String>,
    pub firm: Option<String>,
    pub sectors: Vec<String>,
    #[serde(rename = "stageFocus")]
    pub stage_focus: Vec<String>,
    #[serde(rename = "checkSizeMin")]
    pub check_size_min: Option<f64>,
    #[serde(rename = "checkSizeMax")]
    pub check_size_max: Option<f64>,
    pub score: u8,
    pub tier: MatchTier,
}

impl From<MatchedInvestor> for MatchedInvestorView {
    fn from(matched: MatchedInvestor) -> Self {
        let MatchedInvestor { record, investor } = matched;
        Self {
            investor_id: record.investor_id,
            name: investor.name,
            firm: investor.firm,
            sectors: investor.sectors,
            stage_focus: investor.stage_focus,
            check_size_min: investor.check_size_min,
            check_size_max: investor.check_size_max,
            score: record.score,
            tier: MatchTier::from_score(record.score),
        }
    }
}

/// Response for the match listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMatchesResponse {
    #[serde(rename = "startupId")]
    pub startup_id: String,
    pub matches: Vec<MatchedInvestorView>,
    pub total: usize,
    #[serde(rename = "autoMatched")]
    pub auto_matched: bool,
}

/// Response for the run status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusResponse {
    #[serde(rename = "startupId")]
    pub startup_id: String,
    pub state: RunState,
    pub message: String,
    #[serde(rename = "remainingRematches")]
    pub remaining_rematches: Option<u32>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
