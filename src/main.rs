use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use fithome_analytics::achievements;
use fithome_analytics::body::{self, BodyAssessment, BodyProfile};
use fithome_analytics::config::AppConfig;
use fithome_analytics::export;
use fithome_analytics::logging::init_logging;
use fithome_analytics::models::{
    ApiResponse, DailyNutrition, FitnessReport, NewNutrition, NewSession, NewWeight, UserStats,
};
use fithome_analytics::{AnalyticsError, MetricsAggregator, ReportContext, Result, SessionStore};


/// Read-compute-return HTTP API over the session store.
/// Each request opens its own connection and works on a snapshot.
#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(config.log_json);

    // Create the schema up front so a bad path fails at startup
    SessionStore::open(&config.db_path)?;

    let addr = config.bind_addr;
    let state = AppState {
        config: Arc::new(config),
    };
    let app = app(state).layer(CorsLayer::permissive());

    tracing::info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/users/:id/metrics", get(get_metrics))
        .route("/users/:id/stats", get(get_stats))
        .route("/users/:id/report", get(get_report))
        .route("/users/:id/report.txt", get(export_report))
        .route("/users/:id/sessions", post(create_session))
        .route("/users/:id/weights", post(create_weight))
        .route("/users/:id/nutrition", post(create_nutrition))
        .route("/users/:id/nutrition/:date", get(get_nutrition))
        .route("/body/assessment", post(assess_body))
        .with_state(state)
}

async fn root() -> &'static str {
    "FitHome Analytics API v0.1.0"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Run `f` against a fresh store connection off the async runtime
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&SessionStore, &AppConfig) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let config = Arc::clone(&state.config);
    tokio::task::spawn_blocking(move || {
        let store = SessionStore::open(&config.db_path)?;
        f(&store, &config)
    })
    .await
    .map_err(|e| AnalyticsError::Internal(format!("store task failed: {e}")))?
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Metrics plus a `has_data` flag so clients can tell "no data yet" from an error
async fn get_metrics(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let today = now().date();
    let metrics = with_store(&state, move |store, _| {
        let history = store.load_history(user_id)?;
        Ok(MetricsAggregator::new(&history).calculate_fitness_metrics(today))
    })
    .await?;

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "has_data": metrics.total_workouts > 0,
        "metrics": metrics,
    })))
}

async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStats>> {
    let today = now().date();
    let stats = with_store(&state, move |store, _| {
        let history = store.load_history(user_id)?;
        Ok(MetricsAggregator::new(&history).user_stats(today))
    })
    .await?;
    Ok(Json(stats))
}

async fn build_report(state: &AppState, user_id: i64) -> Result<FitnessReport> {
    let now = now();
    with_store(state, move |store, config| {
        let history = store.load_history(user_id)?;
        let ctx = ReportContext::new(user_id, now)
            .with_windows(config.weekly_window, config.monthly_window);
        Ok(fithome_analytics::generate_report(&history, &ctx))
    })
    .await
}

async fn get_report(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<FitnessReport>> {
    Ok(Json(build_report(&state, user_id).await?))
}

/// Same report as `get_report`, flattened to key-value text for download
async fn export_report(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let report = build_report(&state, user_id).await?;
    let text = export::to_key_value_text(&report)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"fithome_report_{user_id}.txt\""),
            ),
        ],
        text,
    ))
}

/// Record a completed session and grant any achievements it unlocked, atomically
async fn create_session(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(input): Json<NewSession>,
) -> Result<Json<ApiResponse>> {
    let now = now();
    let (session_id, unlocked) = with_store(&state, move |store, _| {
        achievements::record_and_grant(store, user_id, &input, now)
    })
    .await?;

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: format!("Session {session_id} recorded"),
        data: Some(serde_json::json!({
            "session_id": session_id,
            "achievements_unlocked": unlocked,
        })),
    }))
}

async fn create_weight(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(input): Json<NewWeight>,
) -> Result<Json<ApiResponse>> {
    let now = now();
    let weight_id =
        with_store(&state, move |store, _| store.record_weight(user_id, &input, now)).await?;

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: format!("Weight entry {weight_id} recorded"),
        data: Some(serde_json::json!({ "weight_id": weight_id })),
    }))
}

/// Add a meal to the day's intake and return the day's running totals
async fn create_nutrition(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(input): Json<NewNutrition>,
) -> Result<Json<ApiResponse>> {
    let today = now().date();
    let totals =
        with_store(&state, move |store, _| store.record_nutrition(user_id, &input, today)).await?;

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: format!("Nutrition for {} recorded", totals.date),
        data: Some(serde_json::to_value(&totals).map_err(|e| {
            AnalyticsError::Internal(format!("nutrition serialization failed: {e}"))
        })?),
    }))
}

/// A day with nothing logged reads as zero intake
async fn get_nutrition(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(i64, NaiveDate)>,
) -> Result<Json<DailyNutrition>> {
    let logged = with_store(&state, move |store, _| store.daily_nutrition(user_id, date)).await?;
    Ok(Json(logged.unwrap_or(DailyNutrition {
        user_id,
        date,
        calories: 0,
        carbs_g: 0.0,
        protein_g: 0.0,
        fat_g: 0.0,
    })))
}

async fn assess_body(Json(profile): Json<BodyProfile>) -> Result<Json<BodyAssessment>> {
    Ok(Json(body::assess(&profile)?))
}
