//! Comparison route.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use quotediff_core::{Error, RawDocument};
use quotediff_diff::render_markdown;
use serde::Deserialize;
use tracing::error;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/compare", post(compare))
}

/// One document version: either pre-split pages or a single text with
/// form-feed page breaks.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub version: String,
    #[serde(default)]
    pub pages: Option<Vec<String>>,
    #[serde(default)]
    pub text: Option<String>,
}

impl DocumentInput {
    fn into_raw(self) -> Option<RawDocument> {
        match (self.pages, self.text) {
            (Some(pages), _) => Some(RawDocument::new(self.version, pages)),
            (None, Some(text)) => Some(RawDocument::from_text(self.version, &text)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareRequest {
    pub old: DocumentInput,
    pub new: DocumentInput,
    #[serde(default)]
    pub format: ReportFormat,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /api/compare — compare two document versions.
async fn compare(State(state): State<Arc<AppState>>, Json(req): Json<CompareRequest>) -> Response {
    let (Some(old), Some(new)) = (req.old.into_raw(), req.new.into_raw()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "each document needs \"pages\" or \"text\"".into(),
        );
    };

    let report = match state.comparator.compare(&old, &new).await {
        Ok(report) => report,
        Err(e @ Error::NothingToCompare(_)) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
        Err(e) => {
            error!("Comparison failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match req.format {
        ReportFormat::Json => (StatusCode::OK, Json(report)).into_response(),
        ReportFormat::Markdown => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            render_markdown(&report),
        )
            .into_response(),
    }
}
