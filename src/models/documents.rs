//! Typed views over common Paperless-ngx payloads

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PaperlessError;
use crate::services::Payload;

/// Decode a raw payload into a typed model
pub fn from_payload<T: DeserializeOwned>(payload: Payload) -> Result<T, PaperlessError> {
    serde_json::from_value(payload).map_err(|e| {
        PaperlessError::validation("response", format!("Unexpected response shape: {}", e))
    })
}

/// One page of a list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
    /// Ids of every match across all pages (documents only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<i64>,
}

impl<T> Paginated<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// The fields of a document most callers look at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub correspondent: Option<i64>,
    #[serde(default)]
    pub document_type: Option<i64>,
    #[serde(default)]
    pub storage_path: Option<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
    /// `YYYY-MM-DD` on current servers, a full timestamp on older ones
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub archive_serial_number: Option<i64>,
    #[serde(default)]
    pub original_file_name: Option<String>,
}

impl DocumentSummary {
    /// Creation date regardless of which format the server used
    pub fn created_date(&self) -> Option<NaiveDate> {
        let created = self.created.as_deref()?;
        let date = created.get(..10)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }
}

/// Celery task state as reported by `/api/tasks/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
    Revoked,
    #[serde(other)]
    Unknown,
}

/// Status of an ingestion task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default)]
    pub task_file_name: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_done: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
    /// Id of the created document, as a string
    #[serde(default)]
    pub related_document: Option<String>,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskState::Success | TaskState::Failure | TaskState::Revoked
        )
    }

    pub fn related_document_id(&self) -> Option<i64> {
        self.related_document.as_deref()?.trim().parse().ok()
    }
}
