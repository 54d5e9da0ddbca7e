//! Paperless-ngx API client
//!
//! One async method per remote endpoint. Every method builds the request,
//! sends it with the configured credentials and hands the response to the
//! normalizer in [`response`]. Nothing is cached locally.
//!
//! Operations are grouped by area:
//! - [`system`]: status, version, profile, statistics
//! - [`documents`]: document CRUD, binary content, notes, bulk operations
//! - [`upload`]: document ingestion
//! - [`search`]: full-text search and autocomplete
//! - [`resources`]: tags, correspondents, document types, storage paths,
//!   custom fields, share links and saved views

pub mod documents;
pub mod resources;
pub mod response;
pub mod search;
pub mod system;
pub mod upload;

use axum::body::Bytes;
use reqwest::{header, Method, RequestBuilder};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::{
    BulkOperationsConfig, ClientAuthMethod, EmailConfig, PaperlessConfig, SearchConfig,
    UploadConfig,
};
use crate::error::{ConnectionError, PaperlessError};

pub use resources::ResourceKind;
pub use upload::{Metadata, UploadFile};

/// Decoded response body; always a JSON object or array
pub type Payload = Value;

/// Field-operator filters passed verbatim as query parameters
/// (`title__icontains`, `created__gte`, ...)
pub type Filters = BTreeMap<String, String>;

/// Outbound credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    None,
    Token(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Pick credentials from configuration.
    ///
    /// Basic wins only when requested and both halves are present; otherwise
    /// a token is used when configured.
    pub fn from_config(config: &PaperlessConfig) -> Self {
        let auth = &config.auth;
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(String::from);

        if let (ClientAuthMethod::Basic, Some(username), Some(password)) =
            (auth.method, non_empty(&auth.username), non_empty(&auth.password))
        {
            return Self::Basic { username, password };
        }

        match non_empty(&auth.token) {
            Some(token) => Self::Token(token),
            None => Self::None,
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => builder,
            Self::Token(token) => builder.header(header::AUTHORIZATION, format!("Token {}", token)),
            Self::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Token(_) => write!(f, "Token(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
        }
    }
}

/// Client for one Paperless-ngx instance
#[derive(Debug, Clone)]
pub struct PaperlessService {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    page_size: u32,
    upload: UploadConfig,
    search: SearchConfig,
    bulk: BulkOperationsConfig,
    email: EmailConfig,
}

impl PaperlessService {
    /// Create a client from configuration
    pub fn new(config: &PaperlessConfig) -> Result<Self, PaperlessError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(concat!("paperless-gateway/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.defaults.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.security.timeout_seconds))
            .danger_accept_invalid_certs(config.security.accept_invalid_certs())
            .build()
            .map_err(|e| ConnectionError::from_reqwest(&base_url, &e))?;

        Ok(Self {
            client,
            base_url,
            credentials: Credentials::from_config(config),
            page_size: config.defaults.page_size,
            upload: config.upload.clone(),
            search: config.search.clone(),
            bulk: config.bulk_operations.clone(),
            email: config.email.clone(),
        })
    }

    /// Switch to token authentication
    pub fn set_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.credentials = Credentials::Token(token.into());
        self
    }

    /// Switch to HTTP basic authentication
    pub fn set_basic_auth(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.credentials = Credentials::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Copy of this client using the given token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Page size used when a caller does not pass one
    pub fn default_page_size(&self) -> u32 {
        self.page_size
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    /// Largest document set accepted by bulk operations
    pub fn max_bulk_documents(&self) -> usize {
        self.bulk.max_documents
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "Paperless-ngx request");
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::ACCEPT, "application/json");
        self.credentials.apply(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, PaperlessError> {
        builder.send().await.map_err(|e| {
            tracing::warn!(base_url = %self.base_url, error = %e, "Paperless-ngx unreachable");
            ConnectionError::from_reqwest(&self.base_url, &e).into()
        })
    }

    async fn read_body(
        &self,
        reply: reqwest::Response,
    ) -> Result<(reqwest::StatusCode, Bytes), PaperlessError> {
        let status = reply.status();
        let body = reply
            .bytes()
            .await
            .map_err(|e| ConnectionError::from_reqwest(&self.base_url, &e))?;
        Ok((status, body))
    }

    /// Send and normalize the JSON payload
    async fn send_json(&self, builder: RequestBuilder) -> Result<Payload, PaperlessError> {
        let reply = self.send(builder).await?;
        let (status, body) = self.read_body(reply).await?;
        response::normalize(status, &body).map_err(|e| {
            tracing::warn!(status = e.status_code, "{}", e.message);
            e.into()
        })
    }

    /// Send and report whether the server accepted the request
    async fn send_bool(&self, builder: RequestBuilder) -> Result<bool, PaperlessError> {
        let reply = self.send(builder).await?;
        let status = reply.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Paperless-ngx rejected request");
        }
        Ok(status.is_success())
    }

    /// Send and return the raw body of a successful response
    async fn send_bytes(&self, builder: RequestBuilder) -> Result<Bytes, PaperlessError> {
        let reply = self.send(builder).await?;
        let (status, body) = self.read_body(reply).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(response::failure(status, &body).into())
        }
    }

    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Payload, PaperlessError> {
        self.send_json(self.request(Method::GET, path).query(query)).await
    }

    fn page_size_or_default(&self, page_size: Option<u32>) -> u32 {
        page_size.filter(|size| *size > 0).unwrap_or(self.page_size)
    }
}

/// Merge filters with pagination; `page` and `page_size` always win
pub fn build_query(filters: &Filters, page: u32, page_size: u32) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = filters
        .iter()
        .filter(|(key, _)| key.as_str() != "page" && key.as_str() != "page_size")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    query.push(("page".to_string(), page.to_string()));
    query.push(("page_size".to_string(), page_size.to_string()));
    query
}

fn pagination(page: u32, page_size: u32) -> Vec<(String, String)> {
    build_query(&Filters::new(), page, page_size)
}
