//! LLM configuration route (read-only).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use quotediff_extract::LlmConfigResponse;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/llm-config", get(get_llm_config))
}

/// GET /api/llm-config — provider settings in effect, keys masked.
async fn get_llm_config(State(state): State<Arc<AppState>>) -> Json<LlmConfigResponse> {
    Json(state.llm_config.to_response())
}
