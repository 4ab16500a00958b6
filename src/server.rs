//! JSON HTTP operator surface.
//!
//! | Method | Path | |
//! |--------|------|---|
//! | GET | `/health` | liveness and version |
//! | GET | `/api/documents?limit=N` | recent documents, newest first (default 50) |
//! | POST | `/api/pipeline/run` | one pipeline pass; `409` while another is running |

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Result, WatchError};
use crate::events::{CollectingObserver, PhaseEvent};
use crate::models::{Document, PipelineSummary, RunRequest};
use crate::pipeline::Pipeline;

const DEFAULT_LIST_LIMIT: u32 = 50;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Held for the duration of a run.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub summary: PipelineSummary,
    pub timeline: Vec<PhaseEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/documents", get(list_documents))
        .route("/api/pipeline/run", post(run_pipeline))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(pipeline: Pipeline, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Operator API listening");
    axum::serve(listener, router(AppState::new(pipeline))).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> std::result::Result<Json<Vec<Document>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match state.pipeline.store().recent(limit).await {
        Ok(docs) => Ok(Json(docs)),
        Err(e) => {
            error!(error = %e, "Failed to list documents");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

async fn run_pipeline(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> std::result::Result<Json<RunResponse>, ApiError> {
    let Ok(_guard) = state.run_lock.try_lock() else {
        warn!("Run requested while another run is in progress");
        return Err(api_error(StatusCode::CONFLICT, "a pipeline run is already in progress"));
    };

    let observer = CollectingObserver::default();
    match state.pipeline.run_pipeline(&request, &observer).await {
        Ok(summary) => Ok(Json(RunResponse {
            summary,
            timeline: observer.events(),
        })),
        Err(e @ WatchError::UnknownSource(_)) => Err(api_error(StatusCode::BAD_REQUEST, e)),
        Err(e) => {
            error!(error = %e, "Pipeline run failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}
