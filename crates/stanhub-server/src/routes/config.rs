use axum::extract::State;
use axum::Json;
use stanhub_schema::EffectiveConfig;

use crate::state::AppState;

pub async fn get_config(State(state): State<AppState>) -> Json<EffectiveConfig> {
    Json(state.resolver.resolve(&state.project_root))
}
