use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::gemini::FoodRecognizer;
use fitlog_core::models::{
    DailyLog, DailyLogUpdate, DietPlan, DietType, FoodEntry, MacroTargets, NewFoodEntry,
    NewWorkoutEntry, ReconcileSummary, TrendPoint, WeightInput, WorkoutEntry, parse_date,
};
use fitlog_core::normalize::{NutritionCandidate, parse_candidates};
use fitlog_core::recognition::RecognitionRequest;
use fitlog_core::service::{FitlogService, Ledger};
use fitlog_core::session::Session;

// Several base64 photos per request
const BODY_LIMIT: usize = 25 * 1024 * 1024;
const DEFAULT_TREND_DAYS: usize = 7;

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<FitlogService>>,
    recognizer: Option<Arc<dyn FoodRecognizer>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, FitlogService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateFoodRequest {
    name: String,
    carbs: f64,
    protein: f64,
    fat: f64,
    /// Derived from the macros when omitted.
    calories: Option<f64>,
}

#[derive(Deserialize)]
struct CreateWorkoutRequest {
    exercise_name: String,
    sets: i64,
    reps: i64,
    weight: WeightInput,
}

#[derive(Deserialize)]
struct TrendsQuery {
    days: Option<usize>,
}

#[derive(Serialize)]
struct PlanResponse {
    diet_type: DietType,
    label: &'static str,
    targets: MacroTargets,
    target_calories: f64,
}

impl From<DietPlan> for PlanResponse {
    fn from(plan: DietPlan) -> Self {
        Self {
            target_calories: plan.target_calories(),
            diet_type: plan.diet_type,
            label: plan.label,
            targets: plan.targets,
        }
    }
}

#[derive(Serialize)]
struct ResetResponse {
    logs_deleted: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    BadGateway(String),
    NotConfigured(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::NotConfigured(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<fitlog_core::Error> for ApiError {
    fn from(err: fitlog_core::Error) -> Self {
        use fitlog_core::Error;
        match err {
            Error::NotFound { .. } => Self::NotFound(err.to_string()),
            Error::Invalid(msg) => Self::BadRequest(msg),
            Error::InvalidDate(_) => Self::BadRequest(err.to_string()),
            Error::MalformedResponse | Error::IncompleteData => {
                Self::Unprocessable(err.to_string())
            }
            Error::Persistence(_) => Self::Internal(err.into()),
        }
    }
}

fn path_date(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_date(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{raw}'. Use YYYY-MM-DD")))
}

// --- Extractors ---

/// Caller identity from the `X-User-Id` header.
struct UserId(String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| ApiError::BadRequest("Missing X-User-Id header".to_string()))
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let status = response.status();
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), "request failed");
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), "request");
    }
    response
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers: daily logs ---

async fn list_logs(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<DailyLog>>, ApiError> {
    let logs = state.service().load_daily_logs(&user)?;
    Ok(Json(logs.into_values().collect()))
}

async fn get_log(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(date): Path<String>,
) -> Result<Json<DailyLog>, ApiError> {
    let date = path_date(&date)?;
    let log = state
        .service()
        .get_daily_log(&user, date)?
        .ok_or_else(|| ApiError::NotFound(format!("No log for {date}")))?;
    Ok(Json(log))
}

async fn patch_log(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(date): Path<String>,
    Json(update): Json<DailyLogUpdate>,
) -> Result<Json<DailyLog>, ApiError> {
    let date = path_date(&date)?;
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    let log = state.service().update_daily_log(&user, date, &update)?;
    Ok(Json(log))
}

// --- Handlers: entries ---

async fn create_food(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(date): Path<String>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    let date = path_date(&date)?;
    let mut entry = NewFoodEntry::from_macros(req.name, req.carbs, req.protein, req.fat);
    if let Some(calories) = req.calories {
        entry.calories = calories;
    }
    let created = state.service().add_food_entry(&user, date, &entry)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_food(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path((date, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = path_date(&date)?;
    let removed = state.service().remove_food_entry(&user, date, &id)?;
    if !removed {
        tracing::debug!(%date, id = %id, "food entry already absent");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_workout(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(date): Path<String>,
    Json(req): Json<CreateWorkoutRequest>,
) -> Result<(StatusCode, Json<WorkoutEntry>), ApiError> {
    let date = path_date(&date)?;
    let entry = NewWorkoutEntry::new(req.exercise_name, req.sets, req.reps, req.weight.kg());
    let created = state.service().add_workout_entry(&user, date, &entry)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_workout(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path((date, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = path_date(&date)?;
    let removed = state.service().remove_workout_entry(&user, date, &id)?;
    if !removed {
        tracing::debug!(%date, id = %id, "workout entry already absent");
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Handlers: reporting and maintenance ---

async fn get_plans() -> Json<Vec<PlanResponse>> {
    Json(DietPlan::all().into_iter().map(PlanResponse::from).collect())
}

async fn get_trends(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 {
        return Err(ApiError::BadRequest("days must be at least 1".to_string()));
    }
    let service = state.service();
    let session = Session::open(&*service, user)?;
    Ok(Json(session.trend(days)))
}

async fn reconcile(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<ReconcileSummary>, ApiError> {
    let summary = state.service().reconcile(&user)?;
    Ok(Json(summary))
}

async fn delete_user_data(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<ResetResponse>, ApiError> {
    let logs_deleted = state.service().reset_user_data(&user)?;
    Ok(Json(ResetResponse { logs_deleted }))
}

// --- Handlers: AI recognition ---

async fn analyze_food(
    State(state): State<AppState>,
    Json(req): Json<RecognitionRequest>,
) -> Result<Json<Vec<NutritionCandidate>>, ApiError> {
    req.validate()?;
    let recognizer = state.recognizer.as_ref().ok_or_else(|| {
        ApiError::NotConfigured(
            "API key not configured. Set GEMINI_API_KEY in the environment or .env".to_string(),
        )
    })?;

    let raw = recognizer.recognize(&req).await.map_err(|e| {
        tracing::error!("food recognition failed: {e:#}");
        ApiError::BadGateway(format!("Recognition failed: {e}"))
    })?;

    let candidates = parse_candidates(&raw).inspect_err(|e| {
        tracing::warn!(error = %e, "model reply could not be normalized");
    })?;
    Ok(Json(candidates))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/logs", get(list_logs))
        .route("/api/logs/{date}", get(get_log).patch(patch_log))
        .route("/api/logs/{date}/foods", post(create_food))
        .route("/api/logs/{date}/foods/{id}", delete(delete_food))
        .route("/api/logs/{date}/workouts", post(create_workout))
        .route("/api/logs/{date}/workouts/{id}", delete(delete_workout))
        .route("/api/plans", get(get_plans))
        .route("/api/trends", get(get_trends))
        .route("/api/reconcile", post(reconcile))
        .route("/api/user-data", delete(delete_user_data))
        .route("/api/analyze-food", post(analyze_food))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: FitlogService,
    recognizer: Option<Arc<dyn FoodRecognizer>>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if recognizer.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; /api/analyze-food will return 500");
    }

    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        recognizer,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let shown = key.get(..4).zip(key.get(key.len().saturating_sub(4)..));
        if let Some((head, tail)) = shown {
            eprintln!("API key: {head}...{tail} (see api_key file in data directory)");
        }
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%bind, port, "server listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
