pub mod analysis;
pub mod config;
pub mod files;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/config", get(config::get_config))
        .route("/run", post(analysis::run_analysis))
        .route("/ignore-error", post(analysis::ignore_error))
        .route("/file-content", post(files::file_content))
}
