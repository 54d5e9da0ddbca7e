//! Document API endpoints
//!
//! - GET    /documents               - List documents with filters
//! - POST   /documents               - Upload a document (multipart)
//! - GET    /documents/{id}          - Get a document
//! - PUT    /documents/{id}          - Update document fields
//! - DELETE /documents/{id}          - Delete a document
//! - GET    /documents/{id}/download - Download content as base64
//! - POST   /bulk-edit               - Edit many documents at once

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Json, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use data_encoding::BASE64;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tempfile::NamedTempFile;

use crate::api::common::{
    failure, json_body, message, path_id, query_params, success, success_with_message, ApiResult,
};
use crate::api::middleware::AppState;
use crate::config::{MappingKind, MappingsConfig};
use crate::error::{FileError, PaperlessError, ValidationError};
use crate::models::{BulkEditRequest, DocumentUpdateRequest, DownloadQuery, ListQuery, DOCUMENT_FILTERS};
use crate::services::paperless::upload::{guess_mime_type, size_limit_message};
use crate::services::{Metadata, UploadFile};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the documents router
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/documents",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/documents/{id}/download", get(download_document))
        .route("/bulk-edit", post(bulk_edit))
}

/// GET /documents
async fn list_documents(
    State(state): State<AppState>,
    params: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> ApiResult {
    let params = query_params(params)?;
    let query = ListQuery::from_params(
        &params,
        &DOCUMENT_FILTERS,
        state.paperless.default_page_size(),
    )?;

    let documents = state
        .paperless
        .get_documents(&query.filters, query.page, Some(query.page_size))
        .await?;
    Ok(success(documents))
}

/// GET /documents/{id}
async fn get_document(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult {
    let id = path_id(id)?;
    Ok(success(state.paperless.get_document(id).await?))
}

/// PUT /documents/{id}
async fn update_document(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DocumentUpdateRequest>, JsonRejection>,
) -> ApiResult {
    let id = path_id(id)?;
    let request = json_body(body)?;
    request.validate()?;

    let document = state.paperless.update_document(id, &request).await?;
    Ok(success_with_message("Document updated successfully", document))
}

/// DELETE /documents/{id}
async fn delete_document(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let id = path_id(id)?;
    if state.paperless.delete_document(id).await? {
        Ok(message("Document deleted successfully").into_response())
    } else {
        Ok(failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete document"))
    }
}

/// GET /documents/{id}/download
async fn download_document(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult {
    let id = path_id(id)?;
    let original = query_params(query)?.original()?;

    let content = state.paperless.download_document(id, original).await?;
    Ok(Json(json!({
        "success": true,
        "data": BASE64.encode(&content),
        "size": content.len(),
    })))
}

/// POST /bulk-edit
async fn bulk_edit(
    State(state): State<AppState>,
    body: Result<Json<BulkEditRequest>, JsonRejection>,
) -> ApiResult {
    let request = json_body(body)?;
    request.validate(state.paperless.max_bulk_documents())?;

    let (documents, edit) = request.into_parts();
    let result = state.paperless.bulk_edit_documents(&documents, edit).await?;
    Ok(success_with_message("Documents updated successfully", result))
}

// ============================================================================
// Upload
// ============================================================================

/// POST /documents
///
/// Accepts a `document` file part plus optional `title`, `correspondent`,
/// `document_type`, `storage_path`, `tags` (repeated, `tags[]` or comma
/// separated) and `archive_serial_number`. Taxonomy fields take either a
/// numeric id or a name from the configured mappings.
async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut multipart =
        multipart.map_err(|rejection| PaperlessError::validation("document", rejection.body_text()))?;

    let max_file_size = state.paperless.upload_config().max_file_size;
    let mut form = UploadForm::new(&state.mappings, max_file_size);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("document", e, max_file_size))?
    {
        form.accept(field).await?;
    }
    let (_buffer, file, metadata) = form.finish()?;

    let task = state.paperless.upload_document(&file, &metadata).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Document uploaded successfully",
            "document_id": task,
        })),
    ))
}

/// A body cut off by the request limit is reported as an oversized file
fn multipart_error(field: &str, err: MultipartError, max_file_size: u64) -> PaperlessError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return FileError::new(size_limit_message(max_file_size), "", "", "upload").into();
    }
    PaperlessError::validation(field, err.body_text())
}

/// Fields collected from an upload form
struct UploadForm<'a> {
    mappings: &'a MappingsConfig,
    max_file_size: u64,
    document: Option<(NamedTempFile, UploadFile)>,
    metadata: Metadata,
    tags: Vec<i64>,
    errors: ValidationError,
}

impl<'a> UploadForm<'a> {
    fn new(mappings: &'a MappingsConfig, max_file_size: u64) -> Self {
        Self {
            mappings,
            max_file_size,
            document: None,
            metadata: Metadata::new(),
            tags: Vec::new(),
            errors: ValidationError::new("The given data was invalid.", ""),
        }
    }

    async fn accept(&mut self, field: Field<'_>) -> Result<(), PaperlessError> {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document" => {
                self.document = Some(buffer_file(field, self.max_file_size).await?);
            }
            "title" => {
                let title = field_text(field, self.max_file_size).await?;
                if title.chars().count() > 255 {
                    self.errors
                        .add_error("title", "The title may not be greater than 255 characters.");
                } else if !title.trim().is_empty() {
                    self.metadata.insert("title".into(), json!(title.trim()));
                }
            }
            "correspondent" => self.taxonomy(field, MappingKind::Correspondent).await?,
            "document_type" => self.taxonomy(field, MappingKind::DocumentType).await?,
            "storage_path" => self.taxonomy(field, MappingKind::StoragePath).await?,
            "tags" | "tags[]" => {
                let text = field_text(field, self.max_file_size).await?;
                for tag in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    match self.mappings.resolve(MappingKind::Tag, tag) {
                        Some(id) => self.tags.push(id),
                        None => {
                            self.errors
                                .add_error("tags", format!("Unknown tag: {}", tag));
                        }
                    }
                }
            }
            "archive_serial_number" => {
                let text = field_text(field, self.max_file_size).await?;
                let text = text.trim();
                if !text.is_empty() {
                    match text.parse::<i64>() {
                        Ok(asn) if asn >= 0 => {
                            self.metadata.insert("archive_serial_number".into(), json!(asn));
                        }
                        _ => {
                            self.errors.add_error(
                                "archive_serial_number",
                                "The archive serial number must be a non-negative integer.",
                            );
                        }
                    }
                }
            }
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
        Ok(())
    }

    async fn taxonomy(&mut self, field: Field<'_>, kind: MappingKind) -> Result<(), PaperlessError> {
        let name = field.name().unwrap_or_default().to_string();
        let text = field_text(field, self.max_file_size).await?;
        let value = text.trim();
        if value.is_empty() {
            return Ok(());
        }
        match self.mappings.resolve(kind, value) {
            Some(id) => {
                self.metadata.insert(name, json!(id));
            }
            None => {
                self.errors.add_error(
                    name.clone(),
                    format!("The {} must be an id or a configured name.", name.replace('_', " ")),
                );
            }
        }
        Ok(())
    }

    /// The buffered file must outlive the upload, so it is handed back too
    fn finish(mut self) -> Result<(NamedTempFile, UploadFile, Metadata), PaperlessError> {
        if self.document.is_none() {
            self.errors.add_error("document", "The document field is required.");
        }
        if self.errors.first_error().is_some() {
            return Err(self.errors.into());
        }
        if !self.tags.is_empty() {
            self.tags.sort_unstable();
            self.tags.dedup();
            self.metadata.insert("tags".into(), json!(self.tags));
        }

        let (buffer, file) = self.document.ok_or_else(|| {
            PaperlessError::validation("document", "The document field is required.")
        })?;
        Ok((buffer, file, self.metadata))
    }
}

async fn field_text(field: Field<'_>, max_file_size: u64) -> Result<String, PaperlessError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| multipart_error(&name, e, max_file_size))
}

/// Write the uploaded part to a temporary file
async fn buffer_file(
    field: Field<'_>,
    max_file_size: u64,
) -> Result<(NamedTempFile, UploadFile), PaperlessError> {
    let file_name = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or("document")
        .to_string();
    let declared = field
        .content_type()
        .filter(|m| *m != "application/octet-stream")
        .map(str::to_string);

    let contents = field
        .bytes()
        .await
        .map_err(|e| multipart_error("document", e, max_file_size))?;

    let buffer_error = |e: std::io::Error| {
        FileError::new(
            format!("Failed to buffer upload: {}", e),
            "",
            file_name.clone(),
            "upload",
        )
    };
    let buffer = NamedTempFile::new().map_err(buffer_error)?;
    tokio::fs::write(buffer.path(), &contents)
        .await
        .map_err(buffer_error)?;

    let mime = declared.or_else(|| {
        guess_mime_type(std::path::Path::new(&file_name)).map(str::to_string)
    });
    let mut file = UploadFile::new(buffer.path()).with_name(file_name);
    if let Some(mime) = mime {
        file = file.with_mime_type(mime);
    }
    Ok((buffer, file))
}
