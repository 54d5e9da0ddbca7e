//! Document upload
//!
//! Files are checked locally (existence, readability, size, declared MIME
//! type) and metadata is validated before anything is sent. Both kinds of
//! rejection are file errors for the `upload` operation. Paperless-ngx
//! ingests uploads asynchronously and answers with a task id, which is
//! returned as `{"task_id": ...}`.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{PaperlessService, Payload};
use crate::error::{FileError, PaperlessError};

/// Open-ended upload metadata (`title`, `correspondent`, `tags`, ...)
pub type Metadata = Map<String, Value>;

const OPERATION: &str = "upload";

/// A local file to upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub path: PathBuf,
    /// Name reported to the server
    pub file_name: String,
    /// Declared content type, if known
    pub mime_type: Option<String>,
}

impl UploadFile {
    /// File named after the last path component
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Self {
            path,
            file_name,
            mime_type: None,
        }
    }

    pub fn with_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    fn error(&self, message: impl Into<String>) -> FileError {
        FileError::new(
            message,
            self.path.display().to_string(),
            self.file_name.clone(),
            OPERATION,
        )
    }
}

impl PaperlessService {
    /// POST `/api/documents/post_document/`
    pub async fn upload_document(
        &self,
        file: &UploadFile,
        metadata: &Metadata,
    ) -> Result<Payload, PaperlessError> {
        let size = self.check_file(file).await?;
        validate_metadata(file, metadata)?;

        let contents = tokio::fs::read(&file.path)
            .await
            .map_err(|e| read_error(file, &e))?;

        let mut document = Part::bytes(contents).file_name(file.file_name.clone());
        if let Some(mime) = &file.mime_type {
            document = document
                .mime_str(mime)
                .map_err(|_| file.error(format!("Invalid MIME type: {}", mime)))?;
        }

        let mut form = Form::new().part("document", document);
        for (name, value) in form_fields(metadata) {
            form = form.text(name, value);
        }

        tracing::info!(
            file_name = %file.file_name,
            size,
            fields = metadata.len(),
            "Uploading document to Paperless-ngx"
        );

        let payload = self
            .send_json(self.request(Method::POST, "/api/documents/post_document/").multipart(form))
            .await?;
        Ok(into_task_reference(payload))
    }

    /// Existence, readability, size and type checks; returns the size
    async fn check_file(&self, file: &UploadFile) -> Result<u64, FileError> {
        let meta = tokio::fs::metadata(&file.path)
            .await
            .map_err(|e| read_error(file, &e))?;
        if !meta.is_file() {
            return Err(file.error("File does not exist or is not a regular file"));
        }

        let size = meta.len();
        let max = self.upload.max_file_size;
        if size > max {
            return Err(file.error(size_limit_message(max)).with_size(size));
        }

        if let Some(mime) = &file.mime_type {
            if !self.upload.is_type_allowed(mime) {
                return Err(file
                    .error(format!("File type not allowed: {}", mime))
                    .with_size(size));
            }
        }

        Ok(size)
    }
}

/// Message used for every oversized upload
pub(crate) fn size_limit_message(max_file_size: u64) -> String {
    format!(
        "File size exceeds maximum allowed size of {}MB",
        max_file_size / 1024 / 1024
    )
}

fn read_error(file: &UploadFile, err: &std::io::Error) -> FileError {
    match err.kind() {
        ErrorKind::NotFound => file.error("File does not exist"),
        ErrorKind::PermissionDenied => file.error("File is not readable: permission denied"),
        _ => file.error(format!("File is not readable: {}", err)),
    }
}

/// Reject empty arrays and null array elements
pub fn validate_metadata(file: &UploadFile, metadata: &Metadata) -> Result<(), FileError> {
    for (key, value) in metadata {
        if let Value::Array(items) = value {
            if items.is_empty() {
                return Err(file.error(format!(
                    "Metadata field '{}' cannot be an empty array",
                    key
                )));
            }
            if let Some(index) = items.iter().position(Value::is_null) {
                return Err(file.error(format!(
                    "Metadata field '{}[{}]' cannot be null",
                    key, index
                )));
            }
        }
    }
    Ok(())
}

/// Flatten metadata into multipart text fields.
///
/// Nulls are skipped and arrays become repeated fields with the same name.
pub fn form_fields(metadata: &Metadata) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for (key, value) in metadata {
        match value {
            Value::Array(items) => fields.extend(
                items
                    .iter()
                    .filter_map(format_value)
                    .map(|v| (key.clone(), v)),
            ),
            other => {
                if let Some(v) = format_value(other) {
                    fields.push((key.clone(), v));
                }
            }
        }
    }
    fields
}

fn format_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        nested => Some(nested.to_string()),
    }
}

/// A lone `id` is the ingestion task, not a document
fn into_task_reference(payload: Payload) -> Payload {
    match payload {
        Value::Object(map) if map.len() == 1 && map.contains_key("id") => {
            json!({ "task_id": map["id"] })
        }
        other => other,
    }
}

/// Best-effort MIME type from a file extension
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}
