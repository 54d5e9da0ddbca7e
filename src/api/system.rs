//! System API endpoints
//!
//! - GET /test-connection - Check the Paperless-ngx server answers
//! - GET /statistics      - Document statistics
//! - GET /search          - Full-text search

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::api::common::{failure, query_params, success, ApiResult};
use crate::api::middleware::AppState;
use crate::models::SearchQuery;

/// Build the system router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test-connection", get(test_connection))
        .route("/statistics", get(statistics))
        .route("/search", get(search))
}

/// GET /test-connection
///
/// Always answers; an unreachable server is reported as a 500 with a fixed
/// message rather than the underlying error.
async fn test_connection(State(state): State<AppState>) -> Response {
    match state.paperless.get_status().await {
        Ok(status) => Json(json!({
            "success": true,
            "message": "Successfully connected to Paperless-ngx",
            "status": status,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(
                base_url = %state.paperless.base_url(),
                kind = e.kind(),
                error = %e,
                "Paperless connection test failed"
            );
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to connect to Paperless-ngx")
        }
    }
}

/// GET /statistics
async fn statistics(State(state): State<AppState>) -> ApiResult {
    Ok(success(state.paperless.get_statistics().await?))
}

/// GET /search?query=...&db_only=...
async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult {
    let (text, db_only) = query_params(query)?.validate()?;
    Ok(success(state.paperless.search_documents(&text, db_only).await?))
}
