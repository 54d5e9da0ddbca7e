//! Document operations

use axum::body::Bytes;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{build_query, pagination, response, Filters, PaperlessService, Payload};
use crate::error::{PaperlessError, ValidationError};

impl PaperlessService {
    /// GET `/api/documents/` with filters and pagination
    pub async fn get_documents(
        &self,
        filters: &Filters,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Payload, PaperlessError> {
        let query = build_query(filters, page, self.page_size_or_default(page_size));
        self.get_json("/api/documents/", &query).await
    }

    pub async fn get_document(&self, id: i64) -> Result<Payload, PaperlessError> {
        self.get_json(&format!("/api/documents/{}/", id), &[]).await
    }

    /// Look up an ingestion task by the id returned from an upload
    pub async fn get_task(&self, task_id: &str) -> Result<Payload, PaperlessError> {
        let query = [("task_id".to_string(), task_id.to_string())];
        self.get_json("/api/tasks/", &query).await
    }

    /// Replace a document (PUT)
    pub async fn update_document<T: Serialize + ?Sized>(
        &self,
        id: i64,
        data: &T,
    ) -> Result<Payload, PaperlessError> {
        let path = format!("/api/documents/{}/", id);
        self.send_json(self.request(Method::PUT, &path).json(data)).await
    }

    /// Partially update a document (PATCH)
    pub async fn patch_document<T: Serialize + ?Sized>(
        &self,
        id: i64,
        data: &T,
    ) -> Result<Payload, PaperlessError> {
        let path = format!("/api/documents/{}/", id);
        self.send_json(self.request(Method::PATCH, &path).json(data)).await
    }

    /// Returns whether the server accepted the deletion
    pub async fn delete_document(&self, id: i64) -> Result<bool, PaperlessError> {
        let path = format!("/api/documents/{}/", id);
        self.send_bool(self.request(Method::DELETE, &path)).await
    }

    // ========================================================================
    // Binary content
    // ========================================================================

    /// Archived (or, with `original`, the originally ingested) file
    pub async fn download_document(&self, id: i64, original: bool) -> Result<Bytes, PaperlessError> {
        let path = format!("/api/documents/{}/download/", id);
        let mut builder = self.request(Method::GET, &path);
        if original {
            builder = builder.query(&[("original", "true")]);
        }
        self.send_bytes(builder).await
    }

    pub async fn get_document_preview(&self, id: i64) -> Result<Bytes, PaperlessError> {
        let path = format!("/api/documents/{}/preview/", id);
        self.send_bytes(self.request(Method::GET, &path)).await
    }

    pub async fn get_document_thumbnail(&self, id: i64) -> Result<Bytes, PaperlessError> {
        let path = format!("/api/documents/{}/thumb/", id);
        self.send_bytes(self.request(Method::GET, &path)).await
    }

    // ========================================================================
    // Details
    // ========================================================================

    pub async fn get_document_metadata(&self, id: i64) -> Result<Payload, PaperlessError> {
        self.get_json(&format!("/api/documents/{}/metadata/", id), &[]).await
    }

    pub async fn get_document_suggestions(&self, id: i64) -> Result<Payload, PaperlessError> {
        self.get_json(&format!("/api/documents/{}/suggestions/", id), &[]).await
    }

    pub async fn get_document_notes(
        &self,
        id: i64,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Payload, PaperlessError> {
        let query = pagination(page, self.page_size_or_default(page_size));
        self.get_json(&format!("/api/documents/{}/notes/", id), &query).await
    }

    pub async fn add_document_note(&self, id: i64, note: &str) -> Result<Payload, PaperlessError> {
        let path = format!("/api/documents/{}/notes/", id);
        self.send_json(self.request(Method::POST, &path).json(&json!({ "note": note })))
            .await
    }

    pub async fn delete_document_note(&self, document_id: i64, note_id: i64) -> Result<bool, PaperlessError> {
        let path = format!("/api/documents/{}/notes/", document_id);
        self.send_bool(self.request(Method::DELETE, &path).query(&[("id", note_id)]))
            .await
    }

    pub async fn get_document_history(
        &self,
        id: i64,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Payload, PaperlessError> {
        let query = pagination(page, self.page_size_or_default(page_size));
        self.get_json(&format!("/api/documents/{}/history/", id), &query).await
    }

    /// Send a document by email.
    ///
    /// The configured subject prefix is prepended to `subject` unless already
    /// present.
    pub async fn email_document(
        &self,
        id: i64,
        mut email: Map<String, Value>,
    ) -> Result<Payload, PaperlessError> {
        let prefix = self.email.subject_prefix.trim();
        if let Some(Value::String(subject)) = email.get_mut("subject") {
            if !prefix.is_empty() && !subject.starts_with(prefix) {
                *subject = format!("{} {}", prefix, subject);
            }
        }

        let path = format!("/api/documents/{}/email/", id);
        self.send_json(self.request(Method::POST, &path).json(&email)).await
    }

    pub async fn get_document_share_links(&self, id: i64) -> Result<Payload, PaperlessError> {
        self.get_json(&format!("/api/documents/{}/share_links/", id), &[]).await
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    pub async fn bulk_download_documents(&self, ids: &[i64]) -> Result<Payload, PaperlessError> {
        self.check_bulk_size(ids)?;
        let body = json!({ "documents": ids });
        self.send_json(self.request(Method::POST, "/api/documents/bulk_download/").json(&body))
            .await
    }

    /// Apply one edit method to many documents.
    ///
    /// `edit` is merged into `{"documents": ids}`, e.g.
    /// `{"method": "add_tag", "parameters": {"tag": 3}}`. Runs with the bulk
    /// timeout instead of the default one.
    pub async fn bulk_edit_documents(
        &self,
        ids: &[i64],
        edit: Map<String, Value>,
    ) -> Result<Payload, PaperlessError> {
        self.check_bulk_size(ids)?;

        let mut body = Map::new();
        body.insert("documents".to_string(), json!(ids));
        body.extend(edit);

        let builder = self
            .request(Method::POST, "/api/documents/bulk_edit/")
            .timeout(Duration::from_secs(self.bulk.timeout_seconds))
            .json(&body);
        self.send_json(builder).await
    }

    /// Next free archive serial number
    pub async fn get_next_asn(&self) -> Result<i64, PaperlessError> {
        let reply = self
            .send(self.request(Method::GET, "/api/documents/next_asn/"))
            .await?;
        let (status, body) = self.read_body(reply).await?;
        Ok(response::integer_payload(status, &body)?)
    }

    pub async fn get_document_selection_data(&self, ids: &[i64]) -> Result<Payload, PaperlessError> {
        let body = json!({ "documents": ids });
        self.send_json(self.request(Method::POST, "/api/documents/selection_data/").json(&body))
            .await
    }

    fn check_bulk_size(&self, ids: &[i64]) -> Result<(), ValidationError> {
        let max = self.bulk.max_documents;
        if ids.len() > max {
            return Err(ValidationError::for_field(
                "documents",
                format!("At most {} documents can be processed at once", max),
            ));
        }
        Ok(())
    }
}
