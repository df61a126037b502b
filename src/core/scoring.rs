use crate::core::normalizer::PairSignals;
use crate::models::ScoringRubric;

/// Calculate the compatibility score for one pair
///
/// Scoring formula:
/// score = min(
///     base                          # 50
///     + sector_bonus * overlap      # 20 per matching startup sector
///     + stage_bonus * stage_match,  # 15 if the stage lines up
///     max_score                     # 99
/// )
///
/// Sector bonuses accumulate without diminishing returns; only the final
/// clamp bounds the result.
#[inline]
pub fn calculate_match_score(signals: &PairSignals, rubric: &ScoringRubric) -> u8 {
    let sector_points = rubric
        .sector_bonus
        .saturating_mul(signals.sector_overlap_count);
    let stage_points = if signals.stage_matches { rubric.stage_bonus } else { 0 };

    let total = rubric
        .base_score
        .saturating_add(sector_points)
        .saturating_add(stage_points);

    total.min(u32::from(rubric.max_score)) as u8
}
