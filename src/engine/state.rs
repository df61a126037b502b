use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of one matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    FetchingPool,
    Scoring,
    Persisting,
    Done,
    Error,
}

impl RunState {
    /// Whether a run may move from `self` to `next`
    ///
    /// Terminal states only lead back to `Idle`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, FetchingPool)
                | (Idle, Error)
                | (FetchingPool, Scoring)
                | (FetchingPool, Done)
                | (FetchingPool, Error)
                | (Scoring, Persisting)
                | (Persisting, Done)
                | (Persisting, Error)
                | (Done, Idle)
                | (Error, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Error)
    }

    /// Status line shown while the run is at this stage
    pub fn status_message(self) -> &'static str {
        match self {
            RunState::Idle => "Waiting",
            RunState::FetchingPool => "Finding compatible investors...",
            RunState::Scoring => "Scoring investors...",
            RunState::Persisting => "Saving matches...",
            RunState::Done => "Done!",
            RunState::Error => "Error generating matches",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::FetchingPool => "fetching_pool",
            RunState::Scoring => "scoring",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Error => "error",
        };
        f.write_str(name)
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// Explicit user request
    OnDemand,
    /// User re-match, already quota-checked by the caller
    Rematch,
    /// First view of a startup with no matches
    Automatic,
}
