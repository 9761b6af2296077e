use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Failures surfaced by the HTTP API, each answered with a JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("access denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::InvalidJson(e) => json!({ "error": "Invalid JSON body", "message": e.to_string() }),
            Self::BadRequest(msg) | Self::NotFound(msg) => json!({ "error": msg }),
            Self::Forbidden => json!({ "error": "Access denied" }),
            Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed");
                json!({ "error": "Internal Server Error", "message": e.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Decodes a JSON request body regardless of its content type.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}
