//! Error types for the Paperless-ngx client
//!
//! Every fallible operation of the client returns [`PaperlessError`], one of
//! four kinds:
//! - [`ApiError`]: the remote server answered with a failure status
//! - [`ConnectionError`]: the request never produced a response
//! - [`ValidationError`]: input rejected locally before any request was made
//! - [`FileError`]: a local file could not be used for an upload
//!
//! Classification predicates work on status codes and on lowercase substrings
//! of messages and reasons, mirroring what the remote server and the HTTP stack
//! actually report.

pub mod handler;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Any failure of a Paperless-ngx operation
#[derive(Debug, Error)]
pub enum PaperlessError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl PaperlessError {
    /// Short machine-readable kind name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api(_) => "api_error",
            Self::Connection(_) => "connection_error",
            Self::Validation(_) => "validation_error",
            Self::File(_) => "file_error",
        }
    }

    /// Shortcut for a single-field validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::for_field(field, message))
    }
}

// ============================================================================
// API errors
// ============================================================================

/// Failure status returned by the remote server
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status_code: u16,
    /// Decoded response body
    pub response: Map<String, Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status_code: u16, response: Map<String, Value>) -> Self {
        Self {
            message: message.into(),
            status_code,
            response,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }

    pub fn is_authentication_error(&self) -> bool {
        self.status_code == 401
    }

    pub fn is_authorization_error(&self) -> bool {
        self.status_code == 403
    }

    pub fn is_not_found_error(&self) -> bool {
        self.status_code == 404
    }

    pub fn is_validation_error(&self) -> bool {
        self.status_code == 422
    }

    pub fn is_bad_request_error(&self) -> bool {
        self.status_code == 400
    }

    /// A 400 caused by a name or owner clash on the remote side.
    ///
    /// Detected from the message or from any string inside an array-valued
    /// field of the response body (Paperless-ngx reports per-field errors as
    /// lists).
    pub fn is_unique_constraint_violation(&self) -> bool {
        if self.status_code != 400 {
            return false;
        }

        let message = self.message.to_lowercase();
        if ["unique constraint", "already exists", "duplicate"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            return true;
        }

        self.response
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .any(|error| {
                error.contains("unique")
                    || error.contains("already exists")
                    || error.contains("duplicate")
            })
    }
}

// ============================================================================
// Connection errors
// ============================================================================

/// The request did not produce a response
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConnectionError {
    pub message: String,
    pub base_url: String,
    /// Transport-level cause, used for classification
    pub reason: Option<String>,
}

impl ConnectionError {
    pub fn new(
        message: impl Into<String>,
        base_url: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            base_url: base_url.into(),
            reason,
        }
    }

    /// Build from a transport failure.
    ///
    /// The reason is prefixed with the failure category so the substring
    /// predicates below classify it; the rendered source chain follows.
    pub fn from_reqwest(base_url: &str, err: &reqwest::Error) -> Self {
        let chain = error_chain(err);
        let lower = chain.to_lowercase();

        let reason = if err.is_timeout() {
            format!("timeout: {}", chain)
        } else if lower.contains("dns") || lower.contains("failed to lookup address") {
            format!("dns resolution failed: {}", chain)
        } else if lower.contains("certificate") || lower.contains("handshake") {
            format!("ssl/tls handshake failed: {}", chain)
        } else if err.is_connect() {
            format!("network connection failed: {}", chain)
        } else {
            chain
        };

        Self::new(
            format!("Failed to connect to Paperless-ngx: {}", err),
            base_url,
            Some(reason),
        )
    }

    fn reason_contains(&self, needles: &[&str]) -> bool {
        match &self.reason {
            Some(reason) => {
                let reason = reason.to_lowercase();
                needles.iter().any(|needle| reason.contains(needle))
            }
            None => false,
        }
    }

    pub fn is_timeout_error(&self) -> bool {
        self.reason_contains(&["timeout", "timed out"])
    }

    pub fn is_dns_error(&self) -> bool {
        self.reason_contains(&["dns"])
    }

    pub fn is_ssl_error(&self) -> bool {
        self.reason_contains(&["ssl", "tls"])
    }

    pub fn is_network_unreachable(&self) -> bool {
        self.reason_contains(&["network"])
    }
}

/// Render an error and all of its sources as `outer: inner: root`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

// ============================================================================
// Validation errors
// ============================================================================

/// Field name to messages, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, Vec<String>)>);

impl FieldErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.0.push((field, vec![message.into()])),
        }
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|(_, messages)| messages.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, messages) in &self.0 {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

/// Input rejected before reaching the remote server
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// Field the failure is primarily about (may be empty)
    pub field: String,
    errors: FieldErrors,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
            errors: FieldErrors::default(),
        }
    }

    /// One field, one message; the message doubles as the error message
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        let mut error = Self::new(message.clone(), field.clone());
        error.add_error(field, message);
        error
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push(field, message);
        self
    }

    pub fn has_error(&self, field: &str) -> bool {
        !self.errors.get(field).is_empty()
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// First message of the first field that has any
    pub fn first_error(&self) -> Option<&str> {
        self.errors
            .iter()
            .find_map(|(_, messages)| messages.first())
            .map(String::as_str)
    }
}

// ============================================================================
// File errors
// ============================================================================

/// A local file could not be used
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FileError {
    pub message: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: Option<u64>,
    /// What was being done with the file (e.g. `upload`)
    pub operation: String,
}

impl FileError {
    pub fn new(
        message: impl Into<String>,
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            file_path: file_path.into(),
            file_name: file_name.into(),
            file_size: None,
            operation: operation.into(),
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    fn message_contains(&self, needles: &[&str]) -> bool {
        let message = self.message.to_lowercase();
        needles.iter().any(|needle| message.contains(needle))
    }

    pub fn is_file_size_error(&self) -> bool {
        self.message_contains(&["size"])
    }

    pub fn is_file_type_error(&self) -> bool {
        self.message_contains(&["type", "mime"])
    }

    pub fn is_permission_error(&self) -> bool {
        self.message_contains(&["permission", "readable"])
    }

    pub fn is_file_not_found_error(&self) -> bool {
        self.message_contains(&["not found", "does not exist"])
    }

    pub fn is_file_corruption_error(&self) -> bool {
        self.message_contains(&["corrupt", "invalid"])
    }
}
