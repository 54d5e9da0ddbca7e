//! Named resources: tags, correspondents, document types, storage paths,
//! custom fields, share links and saved views
//!
//! All of them share the same list/create/update/delete shape on the remote
//! side, so the generic methods take a [`ResourceKind`] and the named
//! wrappers just fix it.

use reqwest::Method;
use serde::Serialize;

use super::{build_query, Filters, PaperlessService, Payload};
use crate::error::PaperlessError;

/// A collection endpoint of the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Tags,
    Correspondents,
    DocumentTypes,
    StoragePaths,
    CustomFields,
    ShareLinks,
    SavedViews,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        Self::Tags,
        Self::Correspondents,
        Self::DocumentTypes,
        Self::StoragePaths,
        Self::CustomFields,
        Self::ShareLinks,
        Self::SavedViews,
    ];

    /// Collection path, with leading and trailing slash
    pub fn path(self) -> &'static str {
        match self {
            Self::Tags => "/api/tags/",
            Self::Correspondents => "/api/correspondents/",
            Self::DocumentTypes => "/api/document_types/",
            Self::StoragePaths => "/api/storage_paths/",
            Self::CustomFields => "/api/custom_fields/",
            Self::ShareLinks => "/api/share_links/",
            Self::SavedViews => "/api/saved_views/",
        }
    }

    fn item_path(self, id: i64) -> String {
        format!("{}{}/", self.path(), id)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Tags => "tags",
            Self::Correspondents => "correspondents",
            Self::DocumentTypes => "document types",
            Self::StoragePaths => "storage paths",
            Self::CustomFields => "custom fields",
            Self::ShareLinks => "share links",
            Self::SavedViews => "saved views",
        };
        f.write_str(name)
    }
}

impl PaperlessService {
    pub async fn list_resource(
        &self,
        kind: ResourceKind,
        filters: &Filters,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Payload, PaperlessError> {
        let query = build_query(filters, page, self.page_size_or_default(page_size));
        self.get_json(kind.path(), &query).await
    }

    pub async fn create_resource<T: Serialize + ?Sized>(
        &self,
        kind: ResourceKind,
        data: &T,
    ) -> Result<Payload, PaperlessError> {
        self.send_json(self.request(Method::POST, kind.path()).json(data))
            .await
    }

    pub async fn update_resource<T: Serialize + ?Sized>(
        &self,
        kind: ResourceKind,
        id: i64,
        data: &T,
    ) -> Result<Payload, PaperlessError> {
        self.send_json(self.request(Method::PUT, &kind.item_path(id)).json(data))
            .await
    }

    /// Returns whether the server accepted the deletion
    pub async fn delete_resource(&self, kind: ResourceKind, id: i64) -> Result<bool, PaperlessError> {
        self.send_bool(self.request(Method::DELETE, &kind.item_path(id)))
            .await
    }

    /// Saved views are listed without filters
    pub async fn get_saved_views(&self, page: u32, page_size: Option<u32>) -> Result<Payload, PaperlessError> {
        self.list_resource(ResourceKind::SavedViews, &Filters::new(), page, page_size)
            .await
    }
}

macro_rules! resource_methods {
    ($kind:expr, $list:ident, $create:ident, $update:ident, $delete:ident) => {
        impl PaperlessService {
            pub async fn $list(
                &self,
                filters: &Filters,
                page: u32,
                page_size: Option<u32>,
            ) -> Result<Payload, PaperlessError> {
                self.list_resource($kind, filters, page, page_size).await
            }

            pub async fn $create<T: Serialize + ?Sized>(&self, data: &T) -> Result<Payload, PaperlessError> {
                self.create_resource($kind, data).await
            }

            pub async fn $update<T: Serialize + ?Sized>(
                &self,
                id: i64,
                data: &T,
            ) -> Result<Payload, PaperlessError> {
                self.update_resource($kind, id, data).await
            }

            pub async fn $delete(&self, id: i64) -> Result<bool, PaperlessError> {
                self.delete_resource($kind, id).await
            }
        }
    };
}

resource_methods!(ResourceKind::Tags, get_tags, create_tag, update_tag, delete_tag);
resource_methods!(
    ResourceKind::Correspondents,
    get_correspondents,
    create_correspondent,
    update_correspondent,
    delete_correspondent
);
resource_methods!(
    ResourceKind::DocumentTypes,
    get_document_types,
    create_document_type,
    update_document_type,
    delete_document_type
);
resource_methods!(
    ResourceKind::StoragePaths,
    get_storage_paths,
    create_storage_path,
    update_storage_path,
    delete_storage_path
);
resource_methods!(
    ResourceKind::CustomFields,
    get_custom_fields,
    create_custom_field,
    update_custom_field,
    delete_custom_field
);
resource_methods!(
    ResourceKind::ShareLinks,
    get_share_links,
    create_share_link,
    update_share_link,
    delete_share_link
);

impl PaperlessService {
    pub async fn create_saved_view<T: Serialize + ?Sized>(&self, data: &T) -> Result<Payload, PaperlessError> {
        self.create_resource(ResourceKind::SavedViews, data).await
    }

    pub async fn update_saved_view<T: Serialize + ?Sized>(
        &self,
        id: i64,
        data: &T,
    ) -> Result<Payload, PaperlessError> {
        self.update_resource(ResourceKind::SavedViews, id, data).await
    }

    pub async fn delete_saved_view(&self, id: i64) -> Result<bool, PaperlessError> {
        self.delete_resource(ResourceKind::SavedViews, id).await
    }
}
