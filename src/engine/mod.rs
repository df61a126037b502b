// Matching run orchestration
pub mod error;
pub mod lock;
pub mod runner;
pub mod state;

pub use error::MatchingError;
pub use lock::RunLocks;
pub use runner::{EngineOptions, MatchedInvestor, MatchingEngine, RunReport};
pub use state::{RunState, RunTrigger};
