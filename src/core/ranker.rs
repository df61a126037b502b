use crate::models::{MatchRecord, ScoringRubric};

/// Score for one investor, in pool order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestorScore {
    pub investor_id: String,
    pub score: u8,
}

/// Turn per-investor scores into the bounded, ordered match set
///
/// Drops anything below `min_score`, sorts descending by score and keeps the
/// first `top_n`. `sort_by` is stable, so equal scores keep pool order.
pub fn rank_matches(
    startup_id: &str,
    scores: Vec<InvestorScore>,
    rubric: &ScoringRubric,
) -> Vec<MatchRecord> {
    let mut kept: Vec<InvestorScore> = scores
        .into_iter()
        .filter(|s| s.score >= rubric.min_score)
        .collect();

    kept.sort_by(|a, b| b.score.cmp(&a.score));
    kept.truncate(rubric.top_n);

    kept.into_iter()
        .map(|s| MatchRecord {
            startup_id: startup_id.to_string(),
            investor_id: s.investor_id,
            score: s.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(id: &str, score: u8) -> InvestorScore {
        InvestorScore {
            investor_id: id.to_string(),
            score,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rubric = ScoringRubric::default();
        let ranked = rank_matches("s", vec![score("a", 49), score("b", 50)], &rubric);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].investor_id, "b");
    }

    #[test]
    fn test_sorted_descending() {
        let rubric = ScoringRubric::default();
        let ranked = rank_matches(
            "s",
            vec![score("a", 50), score("b", 99), score("c", 70)],
            &rubric,
        );

        let ids: Vec<_> = ranked.iter().map(|m| m.investor_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let rubric = ScoringRubric::default();
        let ranked = rank_matches(
            "s",
            vec![score("x", 70), score("y", 85), score("z", 70), score("w", 70)],
            &rubric,
        );

        let ids: Vec<_> = ranked.iter().map(|m| m.investor_id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z", "w"]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let rubric = ScoringRubric::default();
        let scores = (0..40).map(|i| score(&i.to_string(), 60)).collect();
        let ranked = rank_matches("s", scores, &rubric);

        assert_eq!(ranked.len(), 25);
        assert_eq!(ranked[0].investor_id, "0");
        assert_eq!(ranked[24].investor_id, "24");
    }

    #[test]
    fn test_records_carry_startup_id() {
        let rubric = ScoringRubric::default();
        let ranked = rank_matches("startup-7", vec![score("a", 85)], &rubric);

        assert_eq!(
            ranked,
            vec![MatchRecord {
                startup_id: "startup-7".to_string(),
                investor_id: "a".to_string(),
                score: 85,
            }]
        );
    }

    #[test]
    fn test_empty_input() {
        let rubric = ScoringRubric::default();
        assert!(rank_matches("s", vec![], &rubric).is_empty());
    }
}
