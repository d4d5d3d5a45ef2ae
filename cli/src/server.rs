use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use plateplan_core::error::GenerationError;
use plateplan_core::models::{
    DaySummary, GroceryItem, GroceryList, MacroTargets, Meal, MealPlan, PlanDetail, Recipe,
    RecipeDetail, UserProfile, validate_profile,
};
use plateplan_core::request::MacroOverrides;
use plateplan_core::service::{GenerateOptions, GeneratedPlan, PlannerService, SwappedMeal};
use plateplan_core::transport::PlanTransport;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const DEFAULT_DURATION: i64 = 7;
const MAX_DURATION: i64 = 14;

#[derive(Clone)]
struct AppState {
    service: Arc<PlannerService>,
    transport: Arc<dyn PlanTransport>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    profile: UserProfile,
    targets: MacroTargets,
}

#[derive(Deserialize)]
struct GeneratePlanRequest {
    start_date: Option<NaiveDate>,
    duration: Option<i64>,
    weekly_preferences: Option<String>,
    #[serde(default)]
    overrides: MacroOverrides,
    #[serde(default)]
    excluded_recipes: Vec<String>,
}

#[derive(Deserialize)]
struct SwapMealRequest {
    #[serde(default)]
    excluded_recipes: Vec<String>,
}

#[derive(Deserialize)]
struct MarkEatenRequest {
    /// RFC 3339 timestamp; defaults to now.
    eaten_at: Option<String>,
    #[serde(default)]
    health_record_ids: Vec<String>,
}

#[derive(Deserialize)]
struct RecipeQuery {
    #[serde(default)]
    favorites: bool,
    search: Option<String>,
}

#[derive(Deserialize)]
struct UpdateGroceryItemRequest {
    is_checked: Option<bool>,
    is_locked: Option<bool>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
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

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Server(msg) => Self::BadGateway(msg),
            GenerationError::Decode(_)
            | GenerationError::InvalidResponse
            | GenerationError::DayOutOfRange(_) => {
                tracing::warn!("bad generation response: {err}");
                Self::BadGateway("Invalid response from the plan generator".to_string())
            }
            GenerationError::Transport(detail) => {
                tracing::warn!("generation transport failed: {detail}");
                Self::BadGateway("Plan generator is unreachable".to_string())
            }
            GenerationError::MissingProfile => Self::BadRequest(err.to_string()),
            GenerationError::InProgress => {
                Self::Conflict("A plan generation is already in progress".to_string())
            }
            GenerationError::MealNotFound(id) => Self::NotFound(format!("Meal {id} not found")),
            GenerationError::Storage(e) => Self::Internal(e),
        }
    }
}

fn parse_date_param(date_str: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{date_str}'. Use YYYY-MM-DD")))
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

// --- Profile ---

async fn get_profile(State(state): State<AppState>) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .service
        .get_profile()
        .context("failed to load profile")?
        .ok_or_else(|| ApiError::NotFound("No profile found".to_string()))?;
    let targets = profile.macro_targets();
    Ok(Json(ProfileResponse { profile, targets }))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<ProfileResponse>, ApiError> {
    validate_profile(&profile).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let profile = state
        .service
        .save_profile(&profile)
        .context("failed to save profile")?;
    let targets = profile.macro_targets();
    Ok(Json(ProfileResponse { profile, targets }))
}

// --- Plans ---

async fn generate_plan(
    State(state): State<AppState>,
    Json(req): Json<GeneratePlanRequest>,
) -> Result<(StatusCode, Json<GeneratedPlan>), ApiError> {
    let duration = req.duration.unwrap_or(DEFAULT_DURATION);
    if !(1..=MAX_DURATION).contains(&duration) {
        return Err(ApiError::BadRequest(format!(
            "duration must be between 1 and {MAX_DURATION}"
        )));
    }
    let start = req
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut options = GenerateOptions::new(start, duration);
    options.weekly_preferences = req.weekly_preferences;
    options.overrides = req.overrides;
    options.excluded_recipes = req.excluded_recipes;

    let generated = state
        .service
        .try_generate_plan(state.transport.as_ref(), &options)
        .await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<MealPlan>>, ApiError> {
    let plans = state.service.list_plans().context("failed to list plans")?;
    Ok(Json(plans))
}

async fn get_active_plan(State(state): State<AppState>) -> Result<Json<PlanDetail>, ApiError> {
    let detail = state
        .service
        .active_plan()
        .context("failed to load active plan")?
        .ok_or_else(|| ApiError::NotFound("No active plan".to_string()))?;
    Ok(Json(detail))
}

// --- Meals ---

async fn swap_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SwapMealRequest>,
) -> Result<Json<SwappedMeal>, ApiError> {
    let swapped = state
        .service
        .replace_meal(state.transport.as_ref(), id, &req.excluded_recipes)
        .await?;
    Ok(Json(swapped))
}

async fn mark_eaten(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<MarkEatenRequest>,
) -> Result<Json<Meal>, ApiError> {
    if let Some(at) = &req.eaten_at {
        DateTime::parse_from_rfc3339(at).map_err(|_| {
            ApiError::BadRequest(format!("Invalid eaten_at '{at}'. Use an RFC 3339 timestamp"))
        })?;
    }
    state
        .service
        .get_meal(id)
        .map_err(|_| ApiError::NotFound(format!("Meal {id} not found")))?;
    let meal = state
        .service
        .mark_meal_eaten(id, req.eaten_at.as_deref(), &req.health_record_ids)
        .context("failed to update meal")?;
    Ok(Json(meal))
}

async fn unmark_eaten(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Meal>, ApiError> {
    state
        .service
        .get_meal(id)
        .map_err(|_| ApiError::NotFound(format!("Meal {id} not found")))?;
    let meal = state
        .service
        .unmark_meal_eaten(id)
        .context("failed to update meal")?;
    Ok(Json(meal))
}

async fn get_daily_summary(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<DaySummary>, ApiError> {
    let date = parse_date_param(&date_str)?;
    let summary = state
        .service
        .day_summary(date)
        .context("failed to build summary")?;
    Ok(Json(summary))
}

// --- Recipes ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let recipes = state
        .service
        .list_recipes(query.favorites, search)
        .context("failed to list recipes")?;
    Ok(Json(recipes))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let detail = state
        .service
        .get_recipe_detail(id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    Ok(Json(detail))
}

// --- Grocery ---

async fn build_grocery_list(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
) -> Result<Json<GroceryList>, ApiError> {
    state
        .service
        .get_plan_detail(plan_id)
        .map_err(|_| ApiError::NotFound(format!("Plan {plan_id} not found")))?;
    let list = state
        .service
        .build_grocery_list(plan_id)
        .context("failed to build grocery list")?;
    Ok(Json(list))
}

async fn get_grocery_list(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
) -> Result<Json<GroceryList>, ApiError> {
    let list = state
        .service
        .grocery_list(plan_id)
        .map_err(|_| ApiError::NotFound(format!("Plan {plan_id} not found")))?
        .ok_or_else(|| ApiError::NotFound(format!("No grocery list for plan {plan_id}")))?;
    Ok(Json(list))
}

async fn update_grocery_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateGroceryItemRequest>,
) -> Result<Json<GroceryItem>, ApiError> {
    if req.is_checked.is_none() && req.is_locked.is_none() {
        return Err(ApiError::BadRequest(
            "Provide is_checked and/or is_locked".to_string(),
        ));
    }
    let item = state
        .service
        .update_grocery_item(id, req.is_checked, req.is_locked)
        .map_err(|_| ApiError::NotFound(format!("Grocery item {id} not found")))?;
    Ok(Json(item))
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile", get(get_profile).put(put_profile))
        .route("/api/plans", get(list_plans))
        .route("/api/plans/generate", post(generate_plan))
        .route("/api/plans/active", get(get_active_plan))
        .route(
            "/api/plans/{id}/grocery",
            get(get_grocery_list).post(build_grocery_list),
        )
        .route("/api/meals/{id}/swap", post(swap_meal))
        .route(
            "/api/meals/{id}/eaten",
            post(mark_eaten).delete(unmark_eaten),
        )
        .route("/api/summary/{date}", get(get_daily_summary))
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/{id}", get(get_recipe))
        .route("/api/grocery/items/{id}", put(update_grocery_item))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of a key, or `None` when it is too short to mask.
fn masked_key(key: &str) -> Option<String> {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return None;
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    Some(format!("{head}...{tail}"))
}

pub async fn start_server(
    service: PlannerService,
    transport: Arc<dyn PlanTransport>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(service),
        transport,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key.as_deref().map(masked_key) {
        Some(Some(masked)) => {
            eprintln!("API key: {masked} (see api_key file in data directory)");
        }
        Some(None) => eprintln!("API key: (see api_key file in data directory)"),
        None => eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone."),
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
