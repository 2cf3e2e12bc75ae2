//! HTTP route handlers.

pub mod compare;
pub mod config;
pub mod health;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(compare::routes())
        .merge(config::routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use quotediff_core::DiffConfig;
    use quotediff_extract::LlmConfig;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(AppState::new(DiffConfig::default(), LlmConfig::default())))
    }

    #[tokio::test]
    async fn test_compare_through_router() {
        let body = serde_json::json!({
            "old": {"version": "v1", "text": "# Others IaaS\nSystem Name: Backup\nStorage: 2 TB"},
            "new": {"version": "v2", "text": "# Others IaaS\nSystem Name: Backup\nStorage: 4 TB"},
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/compare")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(report["summary"]["changed"], 1);
    }

    #[tokio::test]
    async fn test_llm_config_is_read_only() {
        let request = Request::builder()
            .method("PUT")
            .uri("/api/llm-config")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"groqApiKey": "gsk"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
