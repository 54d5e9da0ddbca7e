//! Common API utilities and shared types
//!
//! Success envelope plus helpers turning extractor rejections into
//! validation errors, so malformed input gets the same 422 body as any other
//! validation failure.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Json, Path, Query,
    },
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::PaperlessError;

// ============================================================================
// Envelope
// ============================================================================

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// `{"success": true, "message": ..., "data": ...}`
pub fn success_with_message<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

/// `{"success": true, "message": ...}`
pub fn message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

/// Result type of every gateway handler
pub type ApiResult<T = Json<Value>> = Result<T, PaperlessError>;

// ============================================================================
// Extractor rejections
// ============================================================================

/// Body of a JSON request, or a validation error on field `body`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PaperlessError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| PaperlessError::validation("body", rejection.body_text()))
}

/// Query string, or a validation error on field `query`
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, PaperlessError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| PaperlessError::validation("query", rejection.body_text()))
}

/// Numeric path id, or a validation error on field `id`
pub fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, PaperlessError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| PaperlessError::validation("id", rejection.body_text()))
}

/// Plain JSON failure without going through the error taxonomy
pub fn failure(status: axum::http::StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}
