//! Central translation of [`PaperlessError`] into HTTP responses
//!
//! Routes return `Result<_, PaperlessError>`; this is the only place that
//! decides status codes, user-facing wording and the JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use super::PaperlessError;

/// Full JSON error body: `{"success": false, "error": {...}}`
pub fn error_body(err: &PaperlessError) -> Value {
    let mut error = Map::new();
    error.insert("message".into(), json!(err.to_string()));
    error.insert("type".into(), json!(err.kind()));
    error.insert("user_message".into(), json!(user_friendly_message(err)));
    error.insert("retryable".into(), json!(is_retryable(err)));

    match err {
        PaperlessError::Api(e) => {
            error.insert("status_code".into(), json!(e.status_code));
            error.insert("response_data".into(), Value::Object(e.response.clone()));
            error.insert("is_client_error".into(), json!(e.is_client_error()));
            error.insert("is_server_error".into(), json!(e.is_server_error()));
            error.insert("is_authentication_error".into(), json!(e.is_authentication_error()));
            error.insert("is_authorization_error".into(), json!(e.is_authorization_error()));
            error.insert("is_not_found_error".into(), json!(e.is_not_found_error()));
            error.insert("is_validation_error".into(), json!(e.is_validation_error()));
            error.insert(
                "is_unique_constraint_violation".into(),
                json!(e.is_unique_constraint_violation()),
            );
            error.insert("is_bad_request_error".into(), json!(e.is_bad_request_error()));
        }
        PaperlessError::Connection(e) => {
            error.insert("base_url".into(), json!(e.base_url));
            error.insert("reason".into(), json!(e.reason));
            error.insert("is_timeout_error".into(), json!(e.is_timeout_error()));
            error.insert("is_dns_error".into(), json!(e.is_dns_error()));
            error.insert("is_ssl_error".into(), json!(e.is_ssl_error()));
            error.insert("is_network_unreachable".into(), json!(e.is_network_unreachable()));
        }
        PaperlessError::Validation(e) => {
            error.insert("field".into(), json!(e.field));
            error.insert("validation_errors".into(), json!(e.errors()));
            error.insert("first_error".into(), json!(e.first_error()));
        }
        PaperlessError::File(e) => {
            error.insert("file_path".into(), json!(e.file_path));
            error.insert("file_name".into(), json!(e.file_name));
            error.insert("file_size".into(), json!(e.file_size));
            error.insert("operation".into(), json!(e.operation));
            error.insert("is_file_size_error".into(), json!(e.is_file_size_error()));
            error.insert("is_file_type_error".into(), json!(e.is_file_type_error()));
            error.insert("is_permission_error".into(), json!(e.is_permission_error()));
            error.insert("is_file_not_found_error".into(), json!(e.is_file_not_found_error()));
            error.insert(
                "is_file_corruption_error".into(),
                json!(e.is_file_corruption_error()),
            );
        }
    }

    json!({ "success": false, "error": error })
}

/// Whether repeating the same request could succeed.
///
/// Server-side failures, timeouts and unreachable networks qualify; local
/// validation and file problems never do.
pub fn is_retryable(err: &PaperlessError) -> bool {
    match err {
        PaperlessError::Api(e) => e.is_server_error(),
        PaperlessError::Connection(e) => e.is_timeout_error() || e.is_network_unreachable(),
        PaperlessError::Validation(_) | PaperlessError::File(_) => false,
    }
}

/// Message suitable for showing to an end user
pub fn user_friendly_message(err: &PaperlessError) -> String {
    match err {
        PaperlessError::Api(e) => {
            let message = if e.is_authentication_error() {
                "Authentication failed. Please check your credentials."
            } else if e.is_authorization_error() {
                "Access denied. You do not have permission to perform this action."
            } else if e.is_not_found_error() {
                "The requested resource was not found."
            } else if e.is_validation_error() {
                "The request data is invalid. Please check your input."
            } else if e.is_unique_constraint_violation() {
                "A resource with this name already exists. Please use a different name."
            } else if e.is_bad_request_error() {
                "The request is invalid. Please check your input and try again."
            } else if e.is_server_error() {
                "The server encountered an error. Please try again later."
            } else {
                "An error occurred while processing your request."
            };
            message.to_string()
        }
        PaperlessError::Connection(e) => {
            let message = if e.is_timeout_error() {
                "The request timed out. Please check your connection and try again."
            } else if e.is_dns_error() {
                "Unable to resolve the server address. Please check your configuration."
            } else if e.is_ssl_error() {
                "SSL connection failed. Please check your SSL configuration."
            } else if e.is_network_unreachable() {
                "Network connection failed. Please check your network settings."
            } else {
                "Unable to connect to the server. Please check your connection."
            };
            message.to_string()
        }
        PaperlessError::Validation(e) => {
            format!("Validation failed: {}", e.first_error().unwrap_or(&e.message))
        }
        PaperlessError::File(e) => {
            let message = if e.is_file_size_error() {
                "File size exceeds the maximum allowed limit."
            } else if e.is_file_type_error() {
                "File type is not supported."
            } else if e.is_permission_error() {
                "Unable to access the file. Please check file permissions."
            } else if e.is_file_not_found_error() {
                "File not found or inaccessible."
            } else if e.is_file_corruption_error() {
                "File appears to be corrupted or invalid."
            } else {
                return format!("File operation failed: {}", e.message);
            };
            message.to_string()
        }
    }
}

/// HTTP status for the error response
pub fn http_status(err: &PaperlessError) -> StatusCode {
    match err {
        PaperlessError::Api(e) => {
            StatusCode::from_u16(e.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        PaperlessError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        PaperlessError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PaperlessError::File(_) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for PaperlessError {
    fn into_response(self) -> Response {
        let status = http_status(&self);
        tracing::error!(
            kind = self.kind(),
            status = status.as_u16(),
            retryable = is_retryable(&self),
            "Paperless-ngx request failed: {}",
            self
        );
        (status, Json(error_body(&self))).into_response()
    }
}
