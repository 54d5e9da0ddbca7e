//! Taxonomy API endpoints
//!
//! Read-only listings of the names documents are classified by:
//! - GET /tags
//! - GET /correspondents
//! - GET /document-types
//!
//! Each accepts `name__icontains`, `id__in`, `page` and `page_size`.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Router,
};
use std::collections::BTreeMap;

use crate::api::common::{query_params, success, ApiResult};
use crate::api::middleware::AppState;
use crate::models::{ListQuery, RESOURCE_FILTERS};
use crate::services::ResourceKind;

type Params = Result<Query<BTreeMap<String, String>>, QueryRejection>;

/// Build the taxonomy router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/correspondents", get(list_correspondents))
        .route("/document-types", get(list_document_types))
}

async fn list_tags(state: State<AppState>, params: Params) -> ApiResult {
    list(ResourceKind::Tags, state, params).await
}

async fn list_correspondents(state: State<AppState>, params: Params) -> ApiResult {
    list(ResourceKind::Correspondents, state, params).await
}

async fn list_document_types(state: State<AppState>, params: Params) -> ApiResult {
    list(ResourceKind::DocumentTypes, state, params).await
}

async fn list(kind: ResourceKind, State(state): State<AppState>, params: Params) -> ApiResult {
    let params = query_params(params)?;
    let query = ListQuery::from_params(
        &params,
        &RESOURCE_FILTERS,
        state.paperless.default_page_size(),
    )?;

    tracing::debug!(resource = %kind, page = query.page, "Listing resources");
    let page = state
        .paperless
        .list_resource(kind, &query.filters, query.page, Some(query.page_size))
        .await?;
    Ok(success(page))
}
