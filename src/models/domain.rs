use serde::{Deserialize, Deserializer, Serialize};

/// Startup profile being matched against the investor pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sectors: Vec<String>,
    #[serde(default, deserialize_with = "stage_label")]
    pub stage: Option<String>,
}

impl StartupProfile {
    pub fn new(id: impl Into<String>, sectors: &[&str], stage: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: None,
            sectors: sectors.iter().map(|s| s.to_string()).collect(),
            stage: stage.map(str::to_string),
        }
    }
}

/// Investor candidate from the directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub firm: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sectors: Vec<String>,
    /// Stored in the `stage` column upstream
    #[serde(rename = "stage", alias = "stageFocus", default, deserialize_with = "stage_set")]
    pub stage_focus: Vec<String>,
    #[serde(default)]
    pub check_size_min: Option<f64>,
    #[serde(default)]
    pub check_size_max: Option<f64>,
}

impl InvestorProfile {
    pub fn new(id: impl Into<String>, sectors: &[&str], stage_focus: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: None,
            firm: None,
            sectors: sectors.iter().map(|s| s.to_string()).collect(),
            stage_focus: stage_focus.iter().map(|s| s.to_string()).collect(),
            check_size_min: None,
            check_size_max: None,
        }
    }
}

/// One persisted startup/investor pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub startup_id: String,
    pub investor_id: String,
    #[serde(rename = "match_score")]
    pub score: u8,
}

/// Display band for a match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Excellent,
    Good,
    Potential,
}

impl MatchTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => MatchTier::Excellent,
            60..=79 => MatchTier::Good,
            _ => MatchTier::Potential,
        }
    }
}

/// Scoring rubric constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRubric {
    pub base_score: u32,
    pub sector_bonus: u32,
    pub stage_bonus: u32,
    pub max_score: u8,
    pub min_score: u8,
    pub top_n: usize,
}

impl Default for ScoringRubric {
    fn default() -> Self {
        Self {
            base_score: 50,
            sector_bonus: 20,
            stage_bonus: 15,
            max_score: 99,
            min_score: 50,
            top_n: 25,
        }
    }
}

/// Treat a JSON `null` array as empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default().into_iter().flatten().collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStage {
    Text(String),
    Number(serde_json::Number),
    List(Vec<Option<String>>),
}

/// Startup stage arrives as text or, on older rows, as a number
fn stage_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawStage> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawStage::Text(s)) => Some(s),
        Some(RawStage::Number(n)) => Some(n.to_string()),
        Some(RawStage::List(list)) => list.into_iter().flatten().next(),
        None => None,
    })
}

/// Investor stage focus arrives as an array or a single label
fn stage_set<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawStage> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawStage::Text(s)) => vec![s],
        Some(RawStage::Number(n)) => vec![n.to_string()],
        Some(RawStage::List(list)) => list.into_iter().flatten().collect(),
        None => Vec::new(),
    })
}
