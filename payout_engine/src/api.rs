//! HTTP API for the Payout Engine.
//!
//! This module exposes the engine operations over REST using the
//! [`axum`](https://crates.io/crates/axum) framework: computing a month's
//! preview, saving it as a run, moving runs through their lifecycle and
//! settling individual lines.  Engine outcomes map onto status codes:
//! validation errors are 422, lifecycle conflicts 409.

use crate::basis::{JsonDirSource, RecordSource};
use crate::config::EngineConfig;
use crate::currency::{resolve_fx_rate, FixedRate, FxRate, FxRateSource, NoRate};
use crate::engine::{compute_preview, Preview};
use crate::error::PayoutError;
use crate::models::{MonthId, PayoutLine};
use crate::runs::{LinePaidUpdate, PayoutRun, PayoutRunManager, RunStatus};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Application state shared across requests.
pub struct AppState {
    pub source: Arc<dyn RecordSource>,
    pub fx_source: Arc<dyn FxRateSource>,
    pub fx_timeout: Duration,
    pub fx_fallback: Option<FxRate>,
    pub runs: PayoutRunManager,
}

impl AppState {
    /// Wires the JSON input directory, FX source and run store described
    /// by `config`.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let fx_source: Arc<dyn FxRateSource> = match config.fx_rate {
            Some(rate) => Arc::new(FixedRate(rate.value())),
            None => Arc::new(NoRate),
        };
        let runs = match &config.runs_file {
            Some(path) => PayoutRunManager::open(path)
                .await
                .with_context(|| format!("opening run store {}", path.display()))?,
            None => PayoutRunManager::in_memory(),
        };
        Ok(Self {
            source: Arc::new(JsonDirSource::new(config.data_dir.clone())),
            fx_source,
            fx_timeout: config.fx_timeout,
            fx_fallback: config.fx_fallback,
            runs,
        })
    }
}

impl IntoResponse for PayoutError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidMonth(_) | Self::InvalidFxRate(_) => StatusCode::BAD_REQUEST,
            Self::Source(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let details = match &self {
            Self::Validation(errors) => json!(errors),
            _ => json!([]),
        };
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
            "details": details,
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    fx_rate: Option<Decimal>,
    #[serde(default)]
    debug: bool,
}

#[derive(Debug, Deserialize)]
struct ListRunsQuery {
    month: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveRunRequest {
    pub lines: Vec<PayoutLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveRunResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatusRequest {
    pub status: RunStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinePaidRequest {
    pub paid: bool,
}

/// Build the API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/months/:month/preview", get(preview_handler))
        .route("/api/months/:month/runs", post(save_run_handler))
        .route("/api/runs", get(list_runs_handler))
        .route("/api/runs/:run_id", get(get_run_handler).delete(delete_run_handler))
        .route("/api/runs/:run_id/status", post(run_status_handler))
        .route("/api/lines/:line_id/paid", post(line_paid_handler))
        .with_state(state)
}

/// Handler for GET /api/months/:month/preview
async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Path(month): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<Preview>, PayoutError> {
    let month = MonthId::parse(&month)?;
    let requested = query
        .fx_rate
        .map(|value| FxRate::new(value).ok_or(PayoutError::InvalidFxRate(value)))
        .transpose()?;
    let inputs = state.source.month_inputs(&month).await?;
    let fx = resolve_fx_rate(
        requested,
        state.fx_source.as_ref(),
        state.fx_timeout,
        state.fx_fallback,
    )
    .await;
    let preview = compute_preview(&month, &inputs, fx, query.debug)?;
    Ok(Json(preview))
}

/// Handler for POST /api/months/:month/runs
async fn save_run_handler(
    State(state): State<Arc<AppState>>,
    Path(month): Path<String>,
    Json(request): Json<SaveRunRequest>,
) -> Result<Json<SaveRunResponse>, PayoutError> {
    let month = MonthId::parse(&month)?;
    let run_id = state
        .runs
        .save_computed(&month, request.lines, request.notes)
        .await?;
    Ok(Json(SaveRunResponse { run_id }))
}

/// Handler for GET /api/runs
async fn list_runs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<PayoutRun>>, PayoutError> {
    let month = query.month.as_deref().map(MonthId::parse).transpose()?;
    Ok(Json(state.runs.list(month.as_ref()).await))
}

/// Handler for GET /api/runs/:run_id
async fn get_run_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<PayoutRun>, PayoutError> {
    Ok(Json(state.runs.get(run_id).await?))
}

/// Handler for DELETE /api/runs/:run_id
async fn delete_run_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, PayoutError> {
    state.runs.delete(run_id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Handler for POST /api/runs/:run_id/status
async fn run_status_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<RunStatusRequest>,
) -> Result<Json<RunStatusResponse>, PayoutError> {
    let status = state.runs.transition(run_id, request.status).await?;
    Ok(Json(RunStatusResponse { run_id, status }))
}

/// Handler for POST /api/lines/:line_id/paid
async fn line_paid_handler(
    State(state): State<Arc<AppState>>,
    Path(line_id): Path<Uuid>,
    Json(request): Json<LinePaidRequest>,
) -> Result<Json<LinePaidUpdate>, PayoutError> {
    Ok(Json(state.runs.set_paid(line_id, request.paid).await?))
}

/// Launch the API server.  Builds the state from `config`, binds to the
/// configured address and blocks until the server terminates.
pub async fn serve(config: EngineConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config).await?);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        "payout engine listening"
    );
    axum::serve(listener, router).await?;
    Ok(())
}
