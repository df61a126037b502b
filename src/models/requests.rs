use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to run (or re-run) matching for a startup
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunMatchingRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "startup_id", rename = "startupId")]
    pub startup_id: String,
}

/// Query parameters for listing matches
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListMatchesQuery {
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_list_limit")]
    pub limit: u16,
    /// Skip the automatic first run when no matches exist
    #[serde(default, rename = "noAutoMatch")]
    pub no_auto_match: bool,
}

fn default_list_limit() -> u16 {
    50
}

impl Default for ListMatchesQuery {
    fn default() -> Self {
        Self {
            limit: default_list_limit(),
            no_auto_match: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_accepts_both_spellings() {
        let camel: RunMatchingRequest = serde_json::from_str(r#"{"startupId":"s1"}"#).unwrap();
        let snake: RunMatchingRequest = serde_json::from_str(r#"{"startup_id":"s1"}"#).unwrap();
        assert_eq!(camel.startup_id, "s1");
        assert_eq!(snake.startup_id, "s1");
    }

    #[test]
    fn test_empty_startup_id_rejected() {
        let req = RunMatchingRequest {
            startup_id: String::new(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_list_query_limit_bounds() {
        let ok = ListMatchesQuery::default();
        assert!(ok.validate().is_ok());

        let too_big = ListMatchesQuery {
            limit: 500,
            ..ListMatchesQuery::default()
        };
        assert!(too_big.validate().is_err());
    }
}
