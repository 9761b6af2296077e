use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use stanhub_core::orchestrator::{DEFAULT_LEVEL, DEFAULT_PATH};
use stanhub_core::AnalysisRequest;
use stanhub_schema::{IgnoreErrorRequest, RunRequest};

use crate::error::{parse_body, ApiError};
use crate::state::AppState;

/// Starts an analysis and answers before it completes; the result arrives
/// over the push channel.
pub async fn run_analysis(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    tracing::info!(body = %String::from_utf8_lossy(&body), "received /api/run request");
    let params: RunRequest = parse_body(&body)?;

    let request = AnalysisRequest {
        paths: params
            .paths
            .map(|paths| paths.joined())
            .unwrap_or_else(|| DEFAULT_PATH.to_string()),
        level: params.level.unwrap_or(DEFAULT_LEVEL),
        generate_baseline: params.generate_baseline.unwrap_or(false),
    };
    state.orchestrator.trigger(request);

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "running" }))))
}

pub async fn ignore_error(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let params: IgnoreErrorRequest = parse_body(&body)?;
    let (Some(error), Some(file)) = (
        params.error.filter(|e| !e.is_empty()),
        params.file.filter(|f| !f.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Invalid request"));
    };

    state
        .resolver
        .append_ignore_rule(&state.project_root, &error, &file)?;

    Ok(Json(json!({ "status": "success" })))
}
