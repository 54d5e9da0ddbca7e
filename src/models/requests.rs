//! Inbound gateway request types
//!
//! Every type validates itself and reports all field problems at once as a
//! [`ValidationError`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::services::Filters;

/// Filters accepted by the document list route
pub const DOCUMENT_FILTERS: [&str; 10] = [
    "search",
    "title__icontains",
    "content__icontains",
    "correspondent__id",
    "document_type__id",
    "tags__id",
    "created__gte",
    "created__lte",
    "added__gte",
    "added__lte",
];

/// Filters accepted by the tag, correspondent and document type list routes
pub const RESOURCE_FILTERS: [&str; 2] = ["name__icontains", "id__in"];

const TITLE_MAX_CHARS: usize = 255;

// ============================================================================
// Query strings
// ============================================================================

/// Pagination plus the allowed subset of filters from a query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
}

impl ListQuery {
    /// Pick `page`, `page_size` and the `allowed` filters; everything else is dropped
    pub fn from_params(
        params: &BTreeMap<String, String>,
        allowed: &[&str],
        default_page_size: u32,
    ) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::new("The given data was invalid.", "");

        let page = match parse_positive(params.get("page")) {
            Ok(page) => page.unwrap_or(1),
            Err(()) => {
                errors.add_error("page", "The page must be a positive integer.");
                1
            }
        };
        let page_size = match parse_positive(params.get("page_size")) {
            Ok(size) => size.unwrap_or(default_page_size),
            Err(()) => {
                errors.add_error("page_size", "The page size must be a positive integer.");
                default_page_size
            }
        };

        if errors.first_error().is_some() {
            return Err(errors);
        }

        let filters = params
            .iter()
            .filter(|(key, value)| allowed.contains(&key.as_str()) && !value.is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            page,
            page_size,
            filters,
        })
    }
}

fn parse_positive(value: Option<&String>) -> Result<Option<u32>, ()> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(()),
        },
    }
}

/// Parse a boolean query flag (`1`/`0`, `true`/`false`); absent means false
pub fn parse_flag(field: &str, value: Option<&str>) -> Result<bool, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") => Ok(false),
        Some(_) => Err(ValidationError::for_field(
            field,
            format!("The {} field must be true or false.", field),
        )),
    }
}

/// `GET /search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub db_only: Option<String>,
}

impl SearchQuery {
    /// Returns the search text and the `db_only` flag
    pub fn validate(&self) -> Result<(String, bool), ValidationError> {
        let query = self.query.as_deref().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(ValidationError::for_field("query", "The query field is required."));
        }
        let db_only = parse_flag("db_only", self.db_only.as_deref())?;
        Ok((query.to_string(), db_only))
    }
}

/// `GET /documents/{id}/download`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub original: Option<String>,
}

impl DownloadQuery {
    pub fn original(&self) -> Result<bool, ValidationError> {
        parse_flag("original", self.original.as_deref())
    }
}

// ============================================================================
// JSON bodies
// ============================================================================

/// `PUT /documents/{id}`; absent fields are not sent.
///
/// The references and the ASN can be cleared: an explicit `null` is
/// `Some(None)` and is forwarded as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub correspondent: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub document_type: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub storage_path: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub archive_serial_number: Option<Option<i64>>,
}

impl DocumentUpdateRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        Ok(())
    }
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError::for_field(
            "title",
            format!("The title may not be greater than {} characters.", TITLE_MAX_CHARS),
        ));
    }
    Ok(())
}

/// `POST /bulk-edit`
///
/// Accepts either the server's native `method` + `parameters` form or the
/// plain field edits (`correspondent`, `tags`, ...), or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkEditRequest {
    #[serde(default)]
    pub documents: Vec<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub correspondent: Option<i64>,
    #[serde(default)]
    pub document_type: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<i64>>,
    #[serde(default)]
    pub storage_path: Option<i64>,
}

impl BulkEditRequest {
    pub fn validate(&self, max_documents: usize) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new("The given data was invalid.", "documents");

        if self.documents.is_empty() {
            errors.add_error("documents", "The documents field is required.");
        } else if self.documents.len() > max_documents {
            errors.add_error(
                "documents",
                format!("At most {} documents can be processed at once", max_documents),
            );
        }
        if let Some(title) = &self.title {
            if let Err(e) = check_title(title) {
                for message in e.field_errors("title") {
                    errors.add_error("title", message.clone());
                }
            }
        }
        if matches!(&self.method, Some(m) if m.trim().is_empty()) {
            errors.add_error("method", "The method field must not be empty.");
        }

        match errors.first_error() {
            Some(_) => Err(errors),
            None => Ok(()),
        }
    }

    /// Split into the document ids and the edit object
    pub fn into_parts(self) -> (Vec<i64>, Map<String, Value>) {
        let mut edit = Map::new();
        if let Some(method) = self.method {
            edit.insert("method".into(), json!(method));
        }
        if let Some(parameters) = self.parameters {
            edit.insert("parameters".into(), Value::Object(parameters));
        }
        if let Some(title) = self.title {
            edit.insert("title".into(), json!(title));
        }
        if let Some(correspondent) = self.correspondent {
            edit.insert("correspondent".into(), json!(correspondent));
        }
        if let Some(document_type) = self.document_type {
            edit.insert("document_type".into(), json!(document_type));
        }
        if let Some(tags) = self.tags {
            edit.insert("tags".into(), json!(tags));
        }
        if let Some(storage_path) = self.storage_path {
            edit.insert("storage_path".into(), json!(storage_path));
        }
        (self.documents, edit)
    }
}
