use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::engine::{MatchingEngine, MatchingError, RunReport, RunTrigger};
use crate::models::{
    ErrorResponse, HealthResponse, ListMatchesQuery, ListMatchesResponse, MatchedInvestorView,
    RunMatchingRequest, RunReportResponse, RunStatusResponse,
};
use crate::services::kv::{get_json, set_json};
use crate::services::{KeyValueStore, PostgresClient, RematchDecision, RematchLimiter, StoreKey};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
    pub kv: Arc<dyn KeyValueStore>,
    pub rematch: Arc<RematchLimiter>,
    pub postgres: Option<Arc<PostgresClient>>,
    pub list_limit: usize,
    pub cache_ttl: Duration,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/run", web::post().to(run_matching))
        .route("/matches/rematch", web::post().to(rematch))
        .route("/matches/status/{startup_id}", web::get().to(run_status))
        .route("/startups/{startup_id}/matches", web::get().to(list_matches));
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message,
        status_code: 400,
    })
}

fn internal_error(error: &str, message: String) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 500,
    })
}

/// Retire cached listings after a run rewrote the match set
///
/// Listings are cached per generation, so a listing read from the store
/// before the bump is never served after it.
async fn invalidate_listing(state: &AppState, startup_id: &str) {
    if let Err(e) = state.kv.increment(&StoreKey::matches_generation(startup_id)).await {
        tracing::warn!("Failed to invalidate cached matches for {}: {}", startup_id, e);
    }
}

/// Run matching on its own task
///
/// The run and the cache bump complete even when the client disconnects
/// and actix drops the handler future.
fn spawn_run(state: &AppState, startup_id: &str, trigger: RunTrigger) -> JoinHandle<RunReport> {
    let state = state.clone();
    let startup_id = startup_id.to_string();
    tokio::spawn(async move {
        let report = state.engine.run_matching(&startup_id, trigger).await;
        if report.persisted {
            invalidate_listing(&state, &startup_id).await;
        }
        report
    })
}

/// Automatic first run on its own task; `None` if one already happened
fn spawn_auto_match(state: &AppState, startup_id: &str) -> JoinHandle<Option<RunReport>> {
    let state = state.clone();
    let startup_id = startup_id.to_string();
    tokio::spawn(async move {
        let report = state.engine.auto_match_once(&startup_id).await?;
        if report.persisted {
            invalidate_listing(&state, &startup_id).await;
        }
        Some(report)
    })
}

/// Await a spawned run, mapping a crashed task to a 500
async fn join_run<T>(
    handle: JoinHandle<T>,
    startup_id: &str,
) -> Result<T, HttpResponse> {
    handle.await.map_err(|e| {
        tracing::error!("Matching task for {} did not complete: {}", startup_id, e);
        internal_error("Matching run aborted", e.to_string())
    })
}

fn startup_not_found(startup_id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Startup not found".to_string(),
        message: format!("No startup with id {}", startup_id),
        status_code: 404,
    })
}

/// Map a finished run onto an HTTP response
///
/// A failed run is still a 200 carrying `state: "error"`; only an unknown
/// startup becomes a 404.
fn report_response(report: &RunReport, remaining_rematches: Option<u32>) -> HttpResponse {
    if let Some(MatchingError::ProfileNotFound(id)) = &report.error {
        return startup_not_found(id);
    }

    let mut body = RunReportResponse::from(report);
    body.remaining_rematches = remaining_rematches;
    HttpResponse::Ok().json(body)
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.postgres {
        Some(pg) => pg.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Run matching endpoint
///
/// POST /api/v1/matches/run
///
/// Request body:
/// ```json
/// { "startupId": "string" }
/// ```
async fn run_matching(
    state: web::Data<AppState>,
    req: web::Json<RunMatchingRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors.to_string());
    }

    let handle = spawn_run(&state, &req.startup_id, RunTrigger::OnDemand);
    let report = match join_run(handle, &req.startup_id).await {
        Ok(report) => report,
        Err(response) => return response,
    };

    report_response(&report, None)
}

/// Re-match endpoint
///
/// POST /api/v1/matches/rematch
///
/// Same body as `/matches/run`. Consumes one free re-match; responds 429
/// once the quota is used up. Unknown startups get a 404 without touching
/// the quota.
async fn rematch(
    state: web::Data<AppState>,
    req: web::Json<RunMatchingRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors.to_string());
    }

    match state.engine.startup_exists(&req.startup_id).await {
        Ok(true) => {}
        Ok(false) => return startup_not_found(&req.startup_id),
        Err(e) => {
            tracing::error!("Failed to load startup {}: {}", req.startup_id, e);
            return internal_error("Failed to load startup", e.to_string());
        }
    }

    let remaining = match state.rematch.try_consume(&req.startup_id).await {
        Ok(RematchDecision::Allowed { remaining }) => remaining,
        Ok(RematchDecision::Exhausted { used }) => {
            return HttpResponse::TooManyRequests().json(ErrorResponse {
                error: "Re-match limit reached".to_string(),
                message: format!(
                    "Startup {} has used {} of {} free re-matches",
                    req.startup_id,
                    used,
                    state.rematch.max_free()
                ),
                status_code: 429,
            });
        }
        Err(e) => {
            tracing::error!("Failed to check re-match quota for {}: {}", req.startup_id, e);
            return internal_error("Failed to check re-match quota", e.to_string());
        }
    };

    let handle = spawn_run(&state, &req.startup_id, RunTrigger::Rematch);
    let report = match join_run(handle, &req.startup_id).await {
        Ok(report) => report,
        Err(response) => return response,
    };

    report_response(&report, Some(remaining))
}

/// Run status endpoint
///
/// GET /api/v1/matches/status/{startupId}
async fn run_status(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let startup_id = path.into_inner();
    let run_state = state.engine.run_status(&startup_id).await;

    let remaining = match state.rematch.remaining(&startup_id).await {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!("Failed to read re-match quota for {}: {}", startup_id, e);
            None
        }
    };

    HttpResponse::Ok().json(RunStatusResponse {
        startup_id,
        state: run_state,
        message: run_state.status_message().to_string(),
        remaining_rematches: remaining,
    })
}

/// List matches endpoint
///
/// GET /api/v1/startups/{startupId}/matches?limit=50&noAutoMatch=false
///
/// A startup with no stored matches gets one automatic run per process,
/// after which the listing is read again.
async fn list_matches(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListMatchesQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request(errors.to_string());
    }

    let startup_id = path.into_inner();
    let limit = (query.limit as usize).min(state.list_limit);

    // Read before the store so a concurrent run always moves past it
    let cache_key = match state
        .kv
        .read_counter(&StoreKey::matches_generation(&startup_id))
        .await
    {
        Ok(generation) => Some(StoreKey::matches(&startup_id, generation)),
        Err(e) => {
            tracing::warn!("Match cache unavailable for {}: {}", startup_id, e);
            None
        }
    };

    // The cache holds the full listing; requests only narrow it
    if let Some(key) = &cache_key {
        match get_json::<ListMatchesResponse>(state.kv.as_ref(), key).await {
            Ok(Some(mut cached)) => {
                tracing::debug!("Serving cached matches for {}", startup_id);
                cached.matches.truncate(limit);
                cached.total = cached.matches.len();
                cached.auto_matched = false;
                return HttpResponse::Ok().json(cached);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Match cache read failed for {}: {}", startup_id, e),
        }
    }

    let mut matches = match state.engine.matches_for(&startup_id, state.list_limit).await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Failed to load matches for {}: {}", startup_id, e);
            return internal_error("Failed to load matches", e.to_string());
        }
    };

    let mut auto_matched = false;
    if matches.is_empty() && !query.no_auto_match {
        let handle = spawn_auto_match(&state, &startup_id);
        let report = match join_run(handle, &startup_id).await {
            Ok(report) => report,
            Err(response) => return response,
        };
        if let Some(report) = report {
            if let Some(MatchingError::ProfileNotFound(_)) = &report.error {
                return report_response(&report, None);
            }
            auto_matched = report.is_success();
            if auto_matched {
                matches = match state.engine.matches_for(&startup_id, state.list_limit).await {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::error!("Failed to reload matches for {}: {}", startup_id, e);
                        return internal_error("Failed to load matches", e.to_string());
                    }
                };
            }
        }
    }

    let views: Vec<MatchedInvestorView> = matches.into_iter().map(Into::into).collect();
    let mut response = ListMatchesResponse {
        startup_id: startup_id.clone(),
        total: views.len(),
        matches: views,
        auto_matched,
    };

    // An automatic run bumped the generation after `cache_key` was read
    if let Some(key) = cache_key.filter(|_| !auto_matched && !response.matches.is_empty()) {
        if let Err(e) = set_json(state.kv.as_ref(), &key, &response, Some(state.cache_ttl)).await {
            tracing::warn!("Failed to cache matches for {}: {}", startup_id, e);
        }
    }

    response.matches.truncate(limit);
    response.total = response.matches.len();

    tracing::info!(
        "Returning {} matches for startup {}",
        response.total,
        startup_id
    );

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Matcher;
    use crate::engine::EngineOptions;
    use crate::models::{InvestorProfile, StartupProfile};
    use crate::services::{MemoryDirectory, MemoryMatchStore, MemoryStore};
    use actix_web::{http::StatusCode, test, App};

    fn app_state() -> AppState {
        app_state_with_store().0
    }

    fn app_state_with_store() -> (AppState, Arc<MemoryMatchStore>) {
        let store = Arc::new(MemoryMatchStore::new());
        let directory = Arc::new(MemoryDirectory::new(
            vec![StartupProfile::new("s1", &["AI"], Some("seed"))],
            vec![
                InvestorProfile::new("i1", &["Artificial Intelligence"], &["seed", "series-a"]),
                InvestorProfile::new("i2", &["healthtech"], &["growth"]),
            ],
        ));
        let engine = MatchingEngine::new(
            directory.clone(),
            directory,
            store.clone(),
            Matcher::with_default_rubric(),
            EngineOptions::default(),
        );
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

        let state = AppState {
            engine: Arc::new(engine),
            rematch: Arc::new(RematchLimiter::new(kv.clone(), 1)),
            kv,
            postgres: None,
            list_limit: 50,
            cache_ttl: Duration::from_secs(60),
        };
        (state, store)
    }

    #[actix_web::test]
    async fn test_run_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/run")
            .set_json(serde_json::json!({ "startupId": "s1" }))
            .to_request();
        let body: RunReportResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.state, crate::engine::RunState::Done);
        assert_eq!(body.matches.len(), 2);
        assert_eq!(body.matches[0].investor_id, "i1");
        assert_eq!(body.matches[0].score, 85);
    }

    #[actix_web::test]
    async fn test_run_unknown_startup_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/run")
            .set_json(serde_json::json!({ "startupId": "ghost" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_empty_startup_id_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/run")
            .set_json(serde_json::json!({ "startupId": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rematch_quota() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let first = test::TestRequest::post()
            .uri("/matches/rematch")
            .set_json(serde_json::json!({ "startupId": "s1" }))
            .to_request();
        let body: RunReportResponse = test::call_and_read_body_json(&app, first).await;
        assert_eq!(body.remaining_rematches, Some(0));

        let second = test::TestRequest::post()
            .uri("/matches/rematch")
            .set_json(serde_json::json!({ "startupId": "s1" }))
            .to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn test_listing_auto_matches_once() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/startups/s1/matches").to_request();
        let body: ListMatchesResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.auto_matched);
        assert_eq!(body.total, 2);
        assert_eq!(body.matches[0].investor_id, "i1");

        let again = test::TestRequest::get().uri("/startups/s1/matches").to_request();
        let body: ListMatchesResponse = test::call_and_read_body_json(&app, again).await;
        assert!(!body.auto_matched);
        assert_eq!(body.total, 2);
    }

    #[actix_web::test]
    async fn test_listing_without_auto_match() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/startups/s1/matches?noAutoMatch=true")
            .to_request();
        let body: ListMatchesResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.auto_matched);
        assert_eq!(body.total, 0);
    }

    #[actix_web::test]
    async fn test_status_after_run() {
        let state = app_state();
        state.engine.run_matching("s1", RunTrigger::OnDemand).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/matches/status/s1").to_request();
        let body: RunStatusResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.state, crate::engine::RunState::Done);
        assert_eq!(body.remaining_rematches, Some(1));
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn test_rematch_unknown_startup_keeps_quota() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/rematch")
            .set_json(serde_json::json!({ "startupId": "ghost" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.rematch.used("ghost").await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_listing_written_before_a_run_is_not_served_after_it() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let run = test::TestRequest::post()
            .uri("/matches/run")
            .set_json(serde_json::json!({ "startupId": "s1" }))
            .to_request();
        let _: RunReportResponse = test::call_and_read_body_json(&app, run).await;

        // A listing read before the run finishes caching after it
        let stale = ListMatchesResponse {
            startup_id: "s1".to_string(),
            matches: Vec::new(),
            total: 0,
            auto_matched: false,
        };
        set_json(state.kv.as_ref(), &StoreKey::matches("s1", 0), &stale, None)
            .await
            .unwrap();

        let req = test::TestRequest::get().uri("/startups/s1/matches").to_request();
        let body: ListMatchesResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.total, 2);
        assert_eq!(body.matches[0].investor_id, "i1");
    }

    #[actix_web::test]
    async fn test_run_completes_after_client_disconnects() {
        let (state, store) = app_state_with_store();
        store.delay_insert(Some(Duration::from_millis(100))).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/run")
            .set_json(serde_json::json!({ "startupId": "s1" }))
            .to_request();

        // Request future dropped while the replace sits between delete and insert
        let dropped = tokio::time::timeout(Duration::from_millis(20), test::call_service(&app, req)).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(state.engine.run_status("s1").await, crate::engine::RunState::Done);
        assert_eq!(store.rows_for("s1").await.len(), 2);
        assert_eq!(
            state
                .kv
                .read_counter(&StoreKey::matches_generation("s1"))
                .await
                .unwrap(),
            1
        );
    }
}
