//! HTTP control plane
//!
//! Thin framing over the registry and query engine: routing, JSON codec
//! and status mapping only; all semantics live below.

use crate::error::{Error, Result};
use crate::query::{QueryEngine, DEFAULT_MAX_RESULTS};
use crate::registry::{JobRegistry, JobStatus, StartOutcome};
use crate::types::QueryResult;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub query: Arc<QueryEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/repos", post(start_repo).get(list_repos))
        .route("/repos/{name}", get(repo_status).delete(delete_repo))
        .route("/repos/{name}/cancel", post(cancel_repo))
        .route("/query", post(run_query))
        .with_state(state)
}

/// Bind and serve until the process exits
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    repo_url: String,
    repo_name: String,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
    repo_name: String,
    max_results: Option<usize>,
}

async fn start_repo(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> std::result::Result<Response, ApiError> {
    match state.registry.start(&request.repo_url, &request.repo_name)? {
        StartOutcome::Accepted => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "accepted" })),
        )
            .into_response()),
        StartOutcome::AlreadyRunning => Ok((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "repository is already being indexed" })),
        )
            .into_response()),
    }
}

async fn list_repos(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.registry.list())
}

async fn repo_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<Json<JobStatus>, ApiError> {
    state
        .registry
        .status(&name)
        .map(Json)
        .ok_or_else(|| ApiError(Error::not_found(format!("no job for '{name}'"))))
}

async fn cancel_repo(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    state.registry.cancel(&name)?;
    Ok(Json(serde_json::json!({ "status": "cancelling" })))
}

async fn delete_repo(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    state.registry.delete(&name).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<QueryResult>, ApiError> {
    let max_results = request.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    let cancel = CancellationToken::new();
    let result = state
        .query
        .ask(&request.question, &request.repo_name, max_results, &cancel)
        .await?;
    Ok(Json(result))
}

/// Maps domain errors onto HTTP statuses
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
