//! Health route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health — liveness plus the active extraction backend.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let active = state
        .llm_config
        .resolve_provider()
        .map(|r| r.provider.to_string());

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": active.unwrap_or_else(|| "heuristic".into()),
        "workers": state.config.worker_count,
        "similarityThreshold": state.config.similarity_threshold,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotediff_core::DiffConfig;
    use quotediff_extract::LlmConfig;

    #[tokio::test]
    async fn test_health_reports_heuristic_without_keys() {
        let state = Arc::new(AppState::new(DiffConfig::default(), LlmConfig::default()));
        let Json(body) = get_health(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "heuristic");
        assert_eq!(body["workers"], 5);
    }
}
