use crate::models::{InvestorProfile, StartupProfile};

/// Decides whether two free-text taxonomy labels refer to the same thing.
///
/// Implementations receive labels that are already lowercased and trimmed,
/// and are never called with an empty label.
pub trait SimilarityPredicate: Send + Sync {
    fn matches(&self, a: &str, b: &str) -> bool;
}

/// Case-insensitive containment in either direction.
///
/// Permissive on purpose: "ai" matches "artificial intelligence/ai", but also
/// "retail". Short labels can produce false positives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringSimilarity;

impl SimilarityPredicate for SubstringSimilarity {
    #[inline]
    fn matches(&self, a: &str, b: &str) -> bool {
        a.contains(b) || b.contains(a)
    }
}

/// Substring containment, plus acronym expansion.
///
/// "ai" matches "artificial intelligence" because the initials of the
/// multi-word label spell the short one. Every pair accepted by
/// [`SubstringSimilarity`] is still accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcronymSimilarity;

impl AcronymSimilarity {
    fn initials(label: &str) -> Option<String> {
        let words: Vec<&str> = label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.len() < 2 {
            return None;
        }
        Some(words.iter().filter_map(|w| w.chars().next()).collect())
    }

    fn compact(label: &str) -> String {
        label.chars().filter(|c| c.is_alphanumeric()).collect()
    }

    fn expands_to(short: &str, long: &str) -> bool {
        let short = Self::compact(short);
        !short.is_empty() && Self::initials(long).is_some_and(|i| i == short)
    }
}

impl SimilarityPredicate for AcronymSimilarity {
    fn matches(&self, a: &str, b: &str) -> bool {
        SubstringSimilarity.matches(a, b) || Self::expands_to(a, b) || Self::expands_to(b, a)
    }
}

/// Comparable signals extracted for one startup/investor pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairSignals {
    pub sector_overlap_count: u32,
    pub stage_matches: bool,
}

/// Lowercase and trim labels, dropping the empty ones
pub fn normalize_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.as_ref().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Startup attributes normalized once per run
#[derive(Debug, Clone)]
pub struct NormalizedStartup {
    pub sectors: Vec<String>,
    pub stage: Option<String>,
}

impl NormalizedStartup {
    pub fn from_profile(startup: &StartupProfile) -> Self {
        let stage = startup
            .stage
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Self {
            sectors: normalize_labels(&startup.sectors),
            stage,
        }
    }
}

/// Compute the pair signals for one investor
///
/// A startup sector counts once if it matches any investor sector. The stage
/// matches when one of the investor's stage labels contains the startup stage.
pub fn pair_signals(
    startup: &NormalizedStartup,
    investor: &InvestorProfile,
    predicate: &dyn SimilarityPredicate,
) -> PairSignals {
    let investor_sectors = normalize_labels(&investor.sectors);

    let sector_overlap_count = startup
        .sectors
        .iter()
        .filter(|s| investor_sectors.iter().any(|i| predicate.matches(s, i)))
        .count() as u32;

    let stage_matches = match &startup.stage {
        Some(stage) => investor
            .stage_focus
            .iter()
            .map(|s| s.trim().to_lowercase())
            .any(|s| !s.is_empty() && s.contains(stage.as_str())),
        None => false,
    };

    PairSignals {
        sector_overlap_count,
        stage_matches,
    }
}

/// Normalize a startup/investor pair in one step
pub fn normalize(
    startup: &StartupProfile,
    investor: &InvestorProfile,
    predicate: &dyn SimilarityPredicate,
) -> PairSignals {
    pair_signals(&NormalizedStartup::from_profile(startup), investor, predicate)
}
