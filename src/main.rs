use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use pythh_match::config::{LoggingSettings, Settings, SimilarityKind, StoreBackend};
use pythh_match::core::{AcronymSimilarity, Matcher, SimilarityPredicate, SubstringSimilarity};
use pythh_match::engine::{EngineOptions, MatchingEngine};
use pythh_match::models::ScoringRubric;
use pythh_match::routes::{self, matches::AppState};
use pythh_match::services::{
    KeyValueStore, MatchStore, MemoryStore, PostgresClient, RedisStore, RematchLimiter,
    SupabaseClient, SupabaseTables,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// LOG_LEVEL / LOG_FORMAT win over the config file
fn init_logging(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);

    info!("Starting Pythh matching service...");

    // Supabase serves the startup and investor directories
    let supabase = Arc::new(
        SupabaseClient::new(
            settings.supabase.url.clone(),
            settings.supabase.service_key.clone(),
            settings.supabase.timeout_secs,
            SupabaseTables {
                startups: settings.supabase.startups_table.clone(),
                investors: settings.supabase.investors_table.clone(),
                matches: settings.supabase.matches_table.clone(),
            },
        )
        .map_err(|e| startup_error("Failed to build Supabase client", e))?,
    );

    info!("Supabase client initialized");

    let postgres = match settings.database.url.as_deref() {
        Some(url) => {
            let client = PostgresClient::from_settings(
                url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
                settings.database.run_migrations,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;
            info!("PostgreSQL client initialized");
            Some(Arc::new(client))
        }
        None => None,
    };

    let store: Arc<dyn MatchStore> = match (settings.matching.store, &postgres) {
        (StoreBackend::Postgres, Some(pg)) => pg.clone(),
        (StoreBackend::Postgres, None) => {
            return Err(startup_error(
                "Invalid configuration",
                "matching.store = \"postgres\" requires database.url",
            ));
        }
        (StoreBackend::Supabase, _) => supabase.clone(),
    };

    info!("Match store: {:?}", settings.matching.store);

    // Key-value store for the match cache and re-match counters
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let kv: Arc<dyn KeyValueStore> = match settings.cache.redis_url.as_deref() {
        Some(url) => match RedisStore::new(url, l1_cache_size, cache_ttl).await {
            Ok(store) => {
                info!("Redis store initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
                Arc::new(store)
            }
            Err(e) => return Err(startup_error("Failed to connect to Redis", e)),
        },
        None => {
            warn!("No redis_url configured, re-match counters are process-local");
            Arc::new(MemoryStore::new())
        }
    };

    let rubric = ScoringRubric::from(&settings.matching.rubric);
    let predicate: Arc<dyn SimilarityPredicate> = match settings.matching.similarity {
        SimilarityKind::Acronym => Arc::new(AcronymSimilarity),
        SimilarityKind::Substring => Arc::new(SubstringSimilarity),
    };
    let matcher = Matcher::new(rubric).with_predicate(predicate);

    info!(
        "Matcher initialized with rubric {:?} ({:?} similarity)",
        rubric, settings.matching.similarity
    );

    let engine = MatchingEngine::new(
        supabase.clone(),
        supabase,
        store,
        matcher,
        EngineOptions {
            pool_limit: settings.matching.pool_limit,
        },
    );

    let app_state = AppState {
        engine: Arc::new(engine),
        rematch: Arc::new(RematchLimiter::new(kv.clone(), settings.matching.max_free_rematches)),
        kv,
        postgres,
        list_limit: settings.matching.list_limit,
        cache_ttl: Duration::from_secs(cache_ttl),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
