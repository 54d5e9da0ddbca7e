//! Data models
//!
//! Paperless-ngx payloads are passed through as raw JSON by the client; the
//! types here cover the two places where structure matters:
//! - inbound gateway requests, validated before anything is forwarded
//! - typed reads over common payloads (paginated lists, documents, tasks)

mod documents;
mod requests;

pub use documents::{from_payload, DocumentSummary, Paginated, TaskState, TaskStatus};
pub use requests::{
    parse_flag, BulkEditRequest, DocumentUpdateRequest, DownloadQuery, ListQuery, SearchQuery,
    DOCUMENT_FILTERS, RESOURCE_FILTERS,
};
