use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Form, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use waypoint_core::export::{ExportFormat, render_plan, render_plans};
use waypoint_core::{CreatePlanError, PlanPipeline, create_plan};
use waypoint_db::models::{Plan, PlanStats, PlanSummary};
use waypoint_db::queries::plans::{self as plan_db, MAX_PAGE_SIZE, PlanQuery};

use crate::views;

/// Longest search string honoured; longer input is cut.
const MAX_SEARCH_CHARS: usize = 100;

/// Shorter searches list everything.
const MIN_SEARCH_CHARS: usize = 2;

/// Plans shown on the home page.
const RECENT_PLANS: i64 = 5;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    pipeline: PlanPipeline,
    /// Storage URL without connection flags, reported by `/api/stats`.
    database_url: Arc<str>,
}

impl AppState {
    pub fn new(pool: SqlitePool, pipeline: PlanPipeline, database_url: &str) -> Self {
        Self {
            pool,
            pipeline,
            database_url: Arc::from(database_url),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }

    fn plan_not_found(id: Uuid) -> Self {
        Self::not_found(format!("plan {id} not found"))
    }
}

impl From<CreatePlanError> for AppError {
    fn from(err: CreatePlanError) -> Self {
        match err {
            CreatePlanError::InvalidGoal(e) => Self::bad_request(e.to_string()),
            CreatePlanError::Storage(e) => Self::internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Same failures as [`AppError`], rendered for a browser.
pub struct HtmlError(AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let status = self.0.status;
        (
            status,
            Html(views::error_page(status.as_u16(), &self.0.message)),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Request and response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListParams {
    /// Reject out-of-range pagination and normalise the search text.
    fn to_query(&self) -> Result<PlanQuery, AppError> {
        let defaults = PlanQuery::default();
        let page = self.page.unwrap_or(defaults.page);
        if page < 1 {
            return Err(AppError::bad_request("page must be at least 1"));
        }
        let page_size = self.page_size.unwrap_or(defaults.page_size);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::bad_request(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(PlanQuery {
            search: normalize_search(self.search.as_deref()),
            page,
            page_size,
        })
    }
}

fn normalize_search(raw: Option<&str>) -> Option<String> {
    let trimmed: String = raw?.trim().chars().take(MAX_SEARCH_CHARS).collect();
    let trimmed = trimmed.trim_end();
    (trimmed.chars().count() >= MIN_SEARCH_CHARS).then(|| trimmed.to_owned())
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub goal: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<PlanSummary>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/plans", get(plan_list_view).post(create_plan_form))
        .route("/plans/{id}", get(plan_view))
        .route("/api/plans", get(list_plans).post(create_plan_api))
        .route("/api/plans/export/{format}", get(export_plans))
        .route("/api/plans/{id}", get(get_plan).delete(delete_plan))
        .route("/api/plans/{id}/export/{format}", get(export_plan))
        .route("/api/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = build_router(state);
    info!("waypoint serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("waypoint serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parse_plan_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid plan ID: {raw:?}")))
}

fn parse_format(raw: &str) -> Result<ExportFormat, AppError> {
    raw.parse()
        .map_err(|e: waypoint_core::export::ExportFormatParseError| {
            AppError::bad_request(e.to_string())
        })
}

async fn load_plan(pool: &SqlitePool, id: Uuid) -> Result<Plan, AppError> {
    plan_db::get_plan(pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::plan_not_found(id))
}

fn attachment(format: ExportFormat, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// HTML handlers
// ---------------------------------------------------------------------------

async fn home(State(state): State<AppState>) -> Result<Html<String>, HtmlError> {
    let recent = recent_plans(&state.pool).await?;
    Ok(Html(views::home_page(&recent, None, "")))
}

async fn recent_plans(pool: &SqlitePool) -> Result<Vec<PlanSummary>, AppError> {
    let query = PlanQuery {
        page_size: RECENT_PLANS,
        ..PlanQuery::default()
    };
    let page = plan_db::list_plans(pool, &query)
        .await
        .map_err(AppError::internal)?;
    Ok(page.items)
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanForm {
    #[serde(default)]
    pub goal: String,
}

async fn create_plan_form(
    State(state): State<AppState>,
    Form(form): Form<CreatePlanForm>,
) -> Result<Response, HtmlError> {
    match create_plan(&state.pool, &state.pipeline, &form.goal).await {
        Ok(plan) => Ok(Redirect::to(&format!("/plans/{}", plan.id)).into_response()),
        Err(CreatePlanError::InvalidGoal(e)) => {
            // Re-render the form so the user can fix the goal in place.
            let recent = recent_plans(&state.pool).await?;
            let page = views::home_page(&recent, Some(&e.to_string()), &form.goal);
            Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
        }
        Err(e) => Err(AppError::from(e).into()),
    }
}

async fn plan_list_view(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, HtmlError> {
    let query = params.to_query()?;
    let page = plan_db::list_plans(&state.pool, &query)
        .await
        .map_err(AppError::internal)?;
    Ok(Html(views::plan_list_page(&page, query.search.as_deref())))
}

async fn plan_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, HtmlError> {
    let id = parse_plan_id(&id)?;
    let plan = load_plan(&state.pool, id).await?;
    Ok(Html(views::plan_page(&plan)))
}

// ---------------------------------------------------------------------------
// JSON handlers
// ---------------------------------------------------------------------------

async fn create_plan_api(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    let plan = create_plan(&state.pool, &state.pipeline, &request.goal).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_plans(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let query = params.to_query()?;
    let page = plan_db::list_plans(&state.pool, &query)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(ListResponse {
        items: page.items,
        total_count: page.total_count,
        page: page.page,
        page_size: page.page_size,
        search: query.search,
    }))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Plan>, AppError> {
    let id = parse_plan_id(&id)?;
    Ok(Json(load_plan(&state.pool, id).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_plan_id(&id)?;
    let deleted = plan_db::delete_plan(&state.pool, id)
        .await
        .map_err(AppError::internal)?;
    if !deleted {
        return Err(AppError::plan_not_found(id));
    }
    Ok(Json(MessageResponse {
        message: format!("plan {id} deleted"),
    }))
}

async fn export_plan(
    State(state): State<AppState>,
    Path((id, format)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let id = parse_plan_id(&id)?;
    let format = parse_format(&format)?;
    let plan = load_plan(&state.pool, id).await?;
    let body = render_plan(&plan, format).map_err(|e| AppError::internal(e.into()))?;
    Ok(attachment(format, &format.filename(1, Utc::now()), body))
}

async fn export_plans(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let format = parse_format(&format)?;
    let query = params.to_query()?;
    let plans = plan_db::list_full_plans(&state.pool, &query)
        .await
        .map_err(AppError::internal)?;
    if plans.is_empty() {
        return Err(AppError::not_found("no plans found"));
    }

    let now = Utc::now();
    let body = render_plans(&plans, format, now).map_err(|e| AppError::internal(e.into()))?;
    info!(plans = plans.len(), %format, "plans exported");
    Ok(attachment(format, &format.filename(plans.len(), now), body))
}

async fn stats(State(state): State<AppState>) -> Result<Json<PlanStats>, AppError> {
    let stats = plan_db::plan_stats(&state.pool, &state.database_url)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
