use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::models::ScoringRubric;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub supabase: SupabaseSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_startups_table")]
    pub startups_table: String,
    #[serde(default = "default_investors_table")]
    pub investors_table: String,
    #[serde(default = "default_matches_table")]
    pub matches_table: String,
}

fn default_timeout_secs() -> u64 { 30 }
fn default_startups_table() -> String { "startup_uploads".to_string() }
fn default_investors_table() -> String { "investors".to_string() }
fn default_matches_table() -> String { "startup_investor_matches".to_string() }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// Required when `matching.store = "postgres"`
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Falls back to an in-process store when unset
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

/// Where match rows are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Direct connection, single-transaction replace
    Postgres,
    /// PostgREST, delete then insert
    Supabase,
}

/// Label comparison used by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    Substring,
    Acronym,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MatchingSettings {
    #[serde(default = "default_store")]
    pub store: StoreBackend,
    #[serde(default = "default_similarity")]
    pub similarity: SimilarityKind,
    #[validate(range(min = 1))]
    #[serde(default = "default_pool_limit")]
    pub pool_limit: usize,
    #[validate(range(min = 1))]
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_max_free_rematches")]
    pub max_free_rematches: u32,
    #[validate(nested)]
    #[serde(default)]
    pub rubric: RubricConfig,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            store: default_store(),
            similarity: default_similarity(),
            pool_limit: default_pool_limit(),
            list_limit: default_list_limit(),
            max_free_rematches: default_max_free_rematches(),
            rubric: RubricConfig::default(),
        }
    }
}

fn default_store() -> StoreBackend { StoreBackend::Postgres }
fn default_similarity() -> SimilarityKind { SimilarityKind::Acronym }
fn default_pool_limit() -> usize { 200 }
fn default_list_limit() -> usize { 50 }
fn default_max_free_rematches() -> u32 { 1 }

/// Scores are stored in a column constrained to 0..=99
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_score_bounds"))]
pub struct RubricConfig {
    #[serde(default = "default_base_score")]
    pub base_score: u32,
    #[serde(default = "default_sector_bonus")]
    pub sector_bonus: u32,
    #[serde(default = "default_stage_bonus")]
    pub stage_bonus: u32,
    #[validate(range(max = 99))]
    #[serde(default = "default_max_score")]
    pub max_score: u8,
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    #[validate(range(min = 1))]
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn validate_score_bounds(rubric: &RubricConfig) -> Result<(), ValidationError> {
    if rubric.min_score > rubric.max_score {
        return Err(ValidationError::new("min_score_above_max_score"));
    }
    Ok(())
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            base_score: default_base_score(),
            sector_bonus: default_sector_bonus(),
            stage_bonus: default_stage_bonus(),
            max_score: default_max_score(),
            min_score: default_min_score(),
            top_n: default_top_n(),
        }
    }
}

impl From<&RubricConfig> for ScoringRubric {
    fn from(config: &RubricConfig) -> Self {
        Self {
            base_score: config.base_score,
            sector_bonus: config.sector_bonus,
            stage_bonus: config.stage_bonus,
            max_score: config.max_score,
            min_score: config.min_score,
            top_n: config.top_n,
        }
    }
}

fn default_base_score() -> u32 { 50 }
fn default_sector_bonus() -> u32 { 20 }
fn default_stage_bonus() -> u32 { 15 }
fn default_max_score() -> u8 { 99 }
fn default_min_score() -> u8 { 50 }
fn default_top_n() -> usize { 25 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with PYTHH_)
    /// 5. DATABASE_URL / SUPABASE_URL / SUPABASE_SERVICE_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., PYTHH__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("PYTHH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = apply_well_known_env(settings)?.try_deserialize()?;
        settings.validated()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PYTHH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = settings.try_deserialize()?;
        settings.validated()
    }

    /// Reject matching settings that would break the score range
    fn validated(self) -> Result<Self, ConfigError> {
        self.matching
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid [matching] settings: {}", e)))?;
        Ok(self)
    }
}

/// Let the conventional hosting variables win over file values
fn apply_well_known_env(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("SUPABASE_URL", "supabase.url"),
        ("SUPABASE_SERVICE_KEY", "supabase.service_key"),
        ("REDIS_URL", "cache.redis_url"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rubric_matches_reference() {
        let rubric = ScoringRubric::from(&RubricConfig::default());
        assert_eq!(rubric, ScoringRubric::default());
    }

    #[test]
    fn test_default_matching() {
        let matching = MatchingSettings::default();
        assert_eq!(matching.store, StoreBackend::Postgres);
        assert_eq!(matching.similarity, SimilarityKind::Acronym);
        assert_eq!(matching.pool_limit, 200);
        assert_eq!(matching.list_limit, 50);
        assert_eq!(matching.max_free_rematches, 1);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_minimal_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [supabase]
            url = "https://project.supabase.co"
            service_key = "key"

            [matching]
            store = "supabase"
            similarity = "substring"

            [matching.rubric]
            top_n = 10
            "#,
        )
        .unwrap();

        assert_eq!(settings.matching.store, StoreBackend::Supabase);
        assert_eq!(settings.matching.similarity, SimilarityKind::Substring);
        assert_eq!(settings.matching.rubric.top_n, 10);
        assert_eq!(settings.matching.rubric.base_score, 50);
        assert_eq!(settings.supabase.investors_table, "investors");
        assert!(settings.database.url.is_none());
        assert!(settings.cache.redis_url.is_none());
    }

    fn rubric_from_toml(body: &str) -> RubricConfig {
        toml::from_str(body).unwrap()
    }

    #[test]
    fn test_default_rubric_is_valid() {
        assert!(RubricConfig::default().validate().is_ok());
        assert!(MatchingSettings::default().validate().is_ok());
    }

    #[test]
    fn test_rubric_cap_above_99_rejected() {
        let rubric = rubric_from_toml("max_score = 150");
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn test_rubric_floor_above_cap_rejected() {
        let rubric = rubric_from_toml("max_score = 90\nmin_score = 95");
        assert!(rubric.validate().is_err());

        let rubric = rubric_from_toml("min_score = 99");
        assert!(rubric.validate().is_ok());
    }

    #[test]
    fn test_rubric_empty_top_n_rejected() {
        let rubric = rubric_from_toml("top_n = 0");
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_rubric() {
        let dir = std::env::temp_dir().join(format!("pythh-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\nport = 9000\n\n[supabase]\nurl = \"http://localhost\"\nservice_key = \"k\"\n\n[matching.rubric]\nmax_score = 150\nmin_score = 200\n",
        )
        .unwrap();

        let result = Settings::load_from(&path);

        assert!(matches!(result, Err(ConfigError::Message(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("pythh-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\nport = 9000\n\n[supabase]\nurl = \"http://localhost\"\nservice_key = \"k\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.matching.rubric.top_n, 25);
        std::fs::remove_dir_all(&dir).ok();
    }
}
