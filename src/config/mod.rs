//! Configuration management
//!
//! This module handles loading and parsing configuration for the Paperless gateway.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. Unknown keys are
//! ignored, so configuration files carrying settings this crate does not act on
//! (cache, webhooks, retry attempts) still load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::services::ip_filter::IpRule;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway HTTP server
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote Paperless-ngx instance
    #[serde(default)]
    pub paperless: PaperlessConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Inbound authentication for the gateway routes
    #[serde(default)]
    pub api_auth: ApiAuthConfig,
    /// Operational CLI
    #[serde(default)]
    pub cli: CliConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

// ============================================================================
// Paperless-ngx client configuration
// ============================================================================

/// Everything the outbound client needs to talk to Paperless-ngx
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperlessConfig {
    /// Base URL of the Paperless-ngx instance
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: PaperlessAuthConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub bulk_operations: BulkOperationsConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub mappings: MappingsConfig,
}

impl Default for PaperlessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth: PaperlessAuthConfig::default(),
            defaults: DefaultsConfig::default(),
            upload: UploadConfig::default(),
            security: SecurityConfig::default(),
            search: SearchConfig::default(),
            bulk_operations: BulkOperationsConfig::default(),
            email: EmailConfig::default(),
            mappings: MappingsConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Credentials used against the Paperless-ngx API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperlessAuthConfig {
    /// API token (`Authorization: Token <token>`)
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Preferred method; basic is only used when both username and password are set
    #[serde(default)]
    pub method: ClientAuthMethod,
}

/// Outbound authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMethod {
    #[default]
    Token,
    Basic,
}

/// Defaults for document operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Page size used when a caller does not pass one
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_page_size() -> u32 {
    25
}

fn default_timeout() -> u64 {
    30
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 50MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted MIME types
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "application/pdf",
        "image/jpeg",
        "image/png",
        "image/tiff",
        "image/bmp",
        "image/gif",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "text/plain",
        "text/csv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl UploadConfig {
    /// Check if a MIME type is allowed.
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&essence))
    }
}

/// TLS and connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub allow_self_signed: bool,
    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            verify_ssl: true,
            allow_self_signed: false,
            timeout_seconds: default_timeout(),
        }
    }
}

impl SecurityConfig {
    /// Whether certificate validation must be skipped
    pub fn accept_invalid_certs(&self) -> bool {
        !self.verify_ssl || self.allow_self_signed
    }
}

fn default_true() -> bool {
    true
}

/// Search defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Autocomplete limit when the caller does not pass one
    #[serde(default = "default_search_limit")]
    pub default_limit: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
        }
    }
}

fn default_search_limit() -> u32 {
    10
}

/// Bulk operation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperationsConfig {
    /// Maximum number of documents accepted by the bulk-edit route
    #[serde(default = "default_bulk_max_documents")]
    pub max_documents: usize,
    /// Timeout for bulk requests in seconds
    #[serde(default = "default_bulk_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BulkOperationsConfig {
    fn default() -> Self {
        Self {
            max_documents: default_bulk_max_documents(),
            timeout_seconds: default_bulk_timeout(),
        }
    }
}

fn default_bulk_max_documents() -> usize {
    100
}

fn default_bulk_timeout() -> u64 {
    300
}

/// Document e-mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Prepended to the subject of e-mailed documents
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            subject_prefix: default_subject_prefix(),
        }
    }
}

fn default_subject_prefix() -> String {
    "[Paperless]".to_string()
}

/// Name → id mappings for remote resources
///
/// A name may be listed without an id (`important: ~`); it is then unmapped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingsConfig {
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Option<i64>>,
    #[serde(default)]
    pub document_types: BTreeMap<String, Option<i64>>,
    #[serde(default)]
    pub tags: BTreeMap<String, Option<i64>>,
    #[serde(default)]
    pub storage_paths: BTreeMap<String, Option<i64>>,
    #[serde(default)]
    pub correspondents: BTreeMap<String, Option<i64>>,
}

/// Kind of mapped resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    CustomField,
    DocumentType,
    Tag,
    StoragePath,
    Correspondent,
}

impl MappingKind {
    /// Environment variable prefix, e.g. `PAPERLESS_TAG_`
    fn env_prefix(self) -> &'static str {
        match self {
            Self::CustomField => "PAPERLESS_CUSTOM_FIELD_",
            Self::DocumentType => "PAPERLESS_DOCUMENT_TYPE_",
            Self::Tag => "PAPERLESS_TAG_",
            Self::StoragePath => "PAPERLESS_STORAGE_PATH_",
            Self::Correspondent => "PAPERLESS_CORRESPONDENT_",
        }
    }

    const ALL: [MappingKind; 5] = [
        Self::CustomField,
        Self::DocumentType,
        Self::Tag,
        Self::StoragePath,
        Self::Correspondent,
    ];
}

impl MappingsConfig {
    fn table(&self, kind: MappingKind) -> &BTreeMap<String, Option<i64>> {
        match kind {
            MappingKind::CustomField => &self.custom_fields,
            MappingKind::DocumentType => &self.document_types,
            MappingKind::Tag => &self.tags,
            MappingKind::StoragePath => &self.storage_paths,
            MappingKind::Correspondent => &self.correspondents,
        }
    }

    fn table_mut(&mut self, kind: MappingKind) -> &mut BTreeMap<String, Option<i64>> {
        match kind {
            MappingKind::CustomField => &mut self.custom_fields,
            MappingKind::DocumentType => &mut self.document_types,
            MappingKind::Tag => &mut self.tags,
            MappingKind::StoragePath => &mut self.storage_paths,
            MappingKind::Correspondent => &mut self.correspondents,
        }
    }

    /// Look up the id mapped to `name` (case-insensitive); names without an id are unmapped
    pub fn lookup(&self, kind: MappingKind, name: &str) -> Option<i64> {
        let table = self.table(kind);
        table.get(name).copied().flatten().or_else(|| {
            table
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, id)| *id)
        })
    }

    /// Resolve a metadata value that is either a numeric id or a mapped name
    pub fn resolve(&self, kind: MappingKind, value: &str) -> Option<i64> {
        let value = value.trim();
        value
            .parse::<i64>()
            .ok()
            .or_else(|| self.lookup(kind, value))
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default filter directive when RUST_LOG is unset (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Recorded on the server span so log lines can be routed
    #[serde(default = "default_log_channel")]
    pub channel: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            channel: default_log_channel(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_channel() -> String {
    "paperless".to_string()
}

impl LoggingConfig {
    /// Filter directive for tracing-subscriber
    pub fn filter_directive(&self) -> String {
        if !self.enabled {
            return "off".to_string();
        }
        let level = match self.level.to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };
        format!("paperless_gateway={level},tower_http={level}")
    }
}

// ============================================================================
// Inbound API authentication
// ============================================================================

/// Authentication for the gateway's own routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub method: AuthMethod,
    #[serde(default)]
    pub token: TokenAuthConfig,
    #[serde(default)]
    pub basic: BasicAuthConfig,
    /// Exact addresses or CIDR blocks; empty allows every client
    #[serde(default, alias = "ip_whitelist")]
    pub ip_allowlist: Vec<String>,
    /// Read the client address from X-Forwarded-For / X-Real-IP
    #[serde(default)]
    pub trust_proxy_headers: bool,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: AuthMethod::default(),
            token: TokenAuthConfig::default(),
            basic: BasicAuthConfig::default(),
            ip_allowlist: Vec::new(),
            trust_proxy_headers: false,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Inbound authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Identity established by an upstream layer
    #[serde(alias = "sanctum")]
    Session,
    /// Shared-secret header
    #[default]
    Token,
    /// Static username/password
    Basic,
    /// No authentication
    None,
    /// Anything unrecognised; every request is rejected
    #[serde(other)]
    Unsupported,
}

impl FromStr for AuthMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "session" | "sanctum" => Self::Session,
            "token" => Self::Token,
            "basic" => Self::Basic,
            "none" => Self::None,
            _ => Self::Unsupported,
        })
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Session => "session",
            Self::Token => "token",
            Self::Basic => "basic",
            Self::None => "none",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Shared-secret token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAuthConfig {
    #[serde(default = "default_token_header")]
    pub header_name: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            header_name: default_token_header(),
            tokens: Vec::new(),
        }
    }
}

fn default_token_header() -> String {
    "X-Paperless-Token".to_string()
}

/// Static basic-auth credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Per-IP rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_decay_minutes")]
    pub decay_minutes: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            decay_minutes: default_decay_minutes(),
        }
    }
}

fn default_max_attempts() -> u32 {
    60
}

fn default_decay_minutes() -> u64 {
    1
}

impl RateLimitConfig {
    pub fn decay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.decay_minutes * 60)
    }
}

/// CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// File generated tokens are appended to
    #[serde(default = "default_token_backup_path")]
    pub token_backup_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            token_backup_path: default_token_backup_path(),
        }
    }
}

fn default_token_backup_path() -> PathBuf {
    PathBuf::from("storage/paperless-tokens.txt")
}

// ============================================================================
// Loading
// ============================================================================

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides, then validate
    ///
    /// Environment variables use the `PAPERLESS_` prefix, e.g.
    /// - PAPERLESS_BASE_URL
    /// - PAPERLESS_TOKEN / PAPERLESS_USERNAME / PAPERLESS_PASSWORD
    /// - PAPERLESS_API_TOKENS (comma-separated)
    /// - PAPERLESS_API_IP_WHITELIST (comma-separated)
    /// - PAPERLESS_TAG_<NAME>, PAPERLESS_DOCUMENT_TYPE_<NAME>, ...
    pub fn load_with_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        if let Some(host) = env_string("PAPERLESS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("PAPERLESS_SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(origin) = env_string("PAPERLESS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        // Remote instance
        let paperless = &mut self.paperless;
        if let Some(url) = env_string("PAPERLESS_BASE_URL") {
            paperless.base_url = url;
        }
        if let Some(token) = env_string("PAPERLESS_TOKEN") {
            paperless.auth.token = Some(token);
        }
        if let Some(username) = env_string("PAPERLESS_USERNAME") {
            paperless.auth.username = Some(username);
        }
        if let Some(password) = env_string("PAPERLESS_PASSWORD") {
            paperless.auth.password = Some(password);
        }
        if let Some(method) = env_string("PAPERLESS_AUTH_METHOD") {
            match method.to_lowercase().as_str() {
                "token" => paperless.auth.method = ClientAuthMethod::Token,
                "basic" => paperless.auth.method = ClientAuthMethod::Basic,
                _ => {} // Ignore invalid values
            }
        }
        if let Some(page_size) = env_parse("PAPERLESS_PAGE_SIZE") {
            paperless.defaults.page_size = page_size;
        }
        if let Some(timeout) = env_parse("PAPERLESS_TIMEOUT") {
            paperless.defaults.timeout_seconds = timeout;
        }
        if let Some(size) = env_parse("PAPERLESS_MAX_FILE_SIZE") {
            paperless.upload.max_file_size = size;
        }
        if let Some(types) = env_list("PAPERLESS_ALLOWED_MIME_TYPES") {
            paperless.upload.allowed_mime_types = types;
        }
        if let Some(verify) = env_bool("PAPERLESS_VERIFY_SSL") {
            paperless.security.verify_ssl = verify;
        }
        if let Some(allow) = env_bool("PAPERLESS_ALLOW_SELF_SIGNED") {
            paperless.security.allow_self_signed = allow;
        }
        if let Some(timeout) = env_parse("PAPERLESS_REQUEST_TIMEOUT") {
            paperless.security.timeout_seconds = timeout;
        }
        if let Some(limit) = env_parse("PAPERLESS_SEARCH_LIMIT") {
            paperless.search.default_limit = limit;
        }
        if let Some(max) = env_parse("PAPERLESS_BULK_MAX_DOCUMENTS") {
            paperless.bulk_operations.max_documents = max;
        }
        if let Some(timeout) = env_parse("PAPERLESS_BULK_TIMEOUT") {
            paperless.bulk_operations.timeout_seconds = timeout;
        }
        if let Some(prefix) = env_string("PAPERLESS_EMAIL_SUBJECT_PREFIX") {
            paperless.email.subject_prefix = prefix;
        }
        paperless.mappings.apply_env_overrides(std::env::vars());

        // Logging
        if let Some(enabled) = env_bool("PAPERLESS_LOGGING_ENABLED") {
            self.logging.enabled = enabled;
        }
        if let Some(level) = env_string("PAPERLESS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(channel) = env_string("PAPERLESS_LOG_CHANNEL") {
            self.logging.channel = channel;
        }

        // Inbound authentication
        let auth = &mut self.api_auth;
        if let Some(enabled) = env_bool("PAPERLESS_API_AUTH_ENABLED") {
            auth.enabled = enabled;
        }
        if let Some(method) = env_string("PAPERLESS_API_AUTH_METHOD") {
            // FromStr for AuthMethod is infallible
            auth.method = method.parse().unwrap_or_default();
        }
        if let Some(header) = env_string("PAPERLESS_API_TOKEN_HEADER") {
            auth.token.header_name = header;
        }
        if let Some(tokens) = env_list("PAPERLESS_API_TOKENS") {
            auth.token.tokens = tokens;
        }
        if let Some(username) = env_string("PAPERLESS_API_USERNAME") {
            auth.basic.username = Some(username);
        }
        if let Some(password) = env_string("PAPERLESS_API_PASSWORD") {
            auth.basic.password = Some(password);
        }
        if let Some(list) =
            env_list("PAPERLESS_API_IP_ALLOWLIST").or_else(|| env_list("PAPERLESS_API_IP_WHITELIST"))
        {
            auth.ip_allowlist = list;
        }
        if let Some(trust) = env_bool("PAPERLESS_API_TRUST_PROXY_HEADERS") {
            auth.trust_proxy_headers = trust;
        }
        if let Some(enabled) = env_bool("PAPERLESS_API_RATE_LIMIT_ENABLED") {
            auth.rate_limit.enabled = enabled;
        }
        if let Some(max) = env_parse("PAPERLESS_API_RATE_LIMIT_MAX_ATTEMPTS") {
            auth.rate_limit.max_attempts = max;
        }
        if let Some(decay) = env_parse("PAPERLESS_API_RATE_LIMIT_DECAY_MINUTES") {
            auth.rate_limit.decay_minutes = decay;
        }

        // CLI
        if let Some(path) = env_string("PAPERLESS_TOKEN_BACKUP_PATH") {
            self.cli.token_backup_path = PathBuf::from(path);
        }
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.paperless.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "paperless.base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        if self.paperless.defaults.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "paperless.defaults.page_size must be greater than zero".to_string(),
            ));
        }
        if self.api_auth.rate_limit.enabled && self.api_auth.rate_limit.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "api_auth.rate_limit.max_attempts must be greater than zero".to_string(),
            ));
        }
        for entry in &self.api_auth.ip_allowlist {
            IpRule::parse(entry).map_err(|e| {
                ConfigError::ValidationError(format!("api_auth.ip_allowlist: {}", e))
            })?;
        }
        Ok(())
    }
}

impl MappingsConfig {
    /// Merge `PAPERLESS_TAG_IMPORTANT=12` style variables into the tables
    fn apply_env_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            for kind in MappingKind::ALL {
                let Some(name) = key.strip_prefix(kind.env_prefix()) else {
                    continue;
                };
                if name.is_empty() {
                    continue;
                }
                if let Ok(id) = value.trim().parse::<i64>() {
                    self.table_mut(kind).insert(name.to_lowercase(), Some(id));
                }
            }
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).and_then(|v| match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

/// Comma-separated list; blank entries are dropped
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| split_list(&v))
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_KEYS: &[&str] = &[
        "PAPERLESS_BASE_URL",
        "PAPERLESS_TOKEN",
        "PAPERLESS_SERVER_PORT",
        "PAPERLESS_PAGE_SIZE",
        "PAPERLESS_API_TOKENS",
        "PAPERLESS_API_IP_WHITELIST",
        "PAPERLESS_API_IP_ALLOWLIST",
        "PAPERLESS_API_AUTH_METHOD",
        "PAPERLESS_VERIFY_SSL",
        "PAPERLESS_TAG_IMPORTANT",
    ];

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_paperless_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.paperless.base_url, "http://localhost:8000");
        assert_eq!(config.paperless.defaults.page_size, 25);
        assert_eq!(config.paperless.defaults.timeout_seconds, 30);
        assert_eq!(config.paperless.upload.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.paperless.search.default_limit, 10);
        assert_eq!(config.paperless.bulk_operations.max_documents, 100);
        assert_eq!(config.api_auth.method, AuthMethod::Token);
        assert_eq!(config.api_auth.token.header_name, "X-Paperless-Token");
        assert!(config.api_auth.enabled);
        assert_eq!(
            config.cli.token_backup_path,
            PathBuf::from("storage/paperless-tokens.txt")
        );
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.paperless.auth.method, ClientAuthMethod::Token);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9000
paperless:
  base_url: "https://docs.example.com/"
  auth:
    username: admin
    password: secret
    method: basic
  defaults:
    page_size: 50
  mappings:
    tags:
      important: 7
api_auth:
  method: sanctum
  ip_whitelist:
    - 10.0.0.0/8
  rate_limit:
    max_attempts: 5
    decay_minutes: 2
cache:
  enabled: true
  ttl: 3600
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.paperless.base_url, "https://docs.example.com/");
        assert_eq!(config.paperless.auth.method, ClientAuthMethod::Basic);
        assert_eq!(config.paperless.defaults.page_size, 50);
        assert_eq!(config.paperless.mappings.tags.get("important"), Some(&Some(7)));
        assert_eq!(config.api_auth.method, AuthMethod::Session);
        assert_eq!(config.api_auth.ip_allowlist, vec!["10.0.0.0/8".to_string()]);
        assert_eq!(config.api_auth.rate_limit.max_attempts, 5);
        assert_eq!(
            config.api_auth.rate_limit.decay(),
            std::time::Duration::from_secs(120)
        );
    }

    #[test]
    fn test_unknown_auth_method_is_unsupported() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "api_auth:\n  method: kerberos\n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api_auth.method, AuthMethod::Unsupported);
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.paperless.base_url = "localhost:8000".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_allowlist_entry() {
        let mut config = Config::default();
        config.api_auth.ip_allowlist = vec!["10.0.0.0/99".to_string()];
        assert!(config.validate().is_err());

        config.api_auth.ip_allowlist = vec!["10.0.0.0/8".to_string(), "::1".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "paperless:\n  base_url: http://file.example\n").unwrap();

        std::env::set_var("PAPERLESS_BASE_URL", "https://env.example");
        std::env::set_var("PAPERLESS_TOKEN", "abc123");
        std::env::set_var("PAPERLESS_API_TOKENS", "one, two,,three");
        std::env::set_var("PAPERLESS_API_IP_WHITELIST", "127.0.0.1,192.168.0.0/16");
        std::env::set_var("PAPERLESS_API_AUTH_METHOD", "basic");
        std::env::set_var("PAPERLESS_VERIFY_SSL", "false");
        std::env::set_var("PAPERLESS_TAG_IMPORTANT", "42");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.paperless.base_url, "https://env.example");
        assert_eq!(config.paperless.auth.token.as_deref(), Some("abc123"));
        assert_eq!(config.api_auth.token.tokens, vec!["one", "two", "three"]);
        assert_eq!(
            config.api_auth.ip_allowlist,
            vec!["127.0.0.1", "192.168.0.0/16"]
        );
        assert_eq!(config.api_auth.method, AuthMethod::Basic);
        assert!(config.paperless.security.accept_invalid_certs());
        assert_eq!(
            config.paperless.mappings.lookup(MappingKind::Tag, "IMPORTANT"),
            Some(42)
        );

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_number_ignored() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8081\n").unwrap();

        std::env::set_var("PAPERLESS_SERVER_PORT", "not_a_number");
        std::env::set_var("PAPERLESS_PAGE_SIZE", "-4");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.paperless.defaults.page_size, 25);

        clear_env();
    }

    #[test]
    fn test_mapping_resolve_accepts_ids_and_names() {
        let mut mappings = MappingsConfig::default();
        mappings.document_types.insert("invoice".to_string(), Some(3));

        assert_eq!(mappings.resolve(MappingKind::DocumentType, "17"), Some(17));
        assert_eq!(mappings.resolve(MappingKind::DocumentType, "Invoice"), Some(3));
        assert_eq!(mappings.resolve(MappingKind::DocumentType, "receipt"), None);
        assert_eq!(mappings.resolve(MappingKind::Tag, "invoice"), None);
    }

    #[test]
    fn test_mapping_without_id_is_unmapped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "paperless:\n  mappings:\n    tags: {{important: ~, urgent: 7}}\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let mappings = &config.paperless.mappings;

        assert_eq!(mappings.tags.get("important"), Some(&None));
        assert_eq!(mappings.lookup(MappingKind::Tag, "important"), None);
        assert_eq!(mappings.resolve(MappingKind::Tag, "Important"), None);
        assert_eq!(mappings.resolve(MappingKind::Tag, "urgent"), Some(7));
        assert_eq!(mappings.resolve(MappingKind::Tag, "4"), Some(4));
    }

    #[test]
    fn test_upload_mime_check_ignores_parameters() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("application/pdf"));
        assert!(upload.is_type_allowed("text/plain; charset=utf-8"));
        assert!(upload.is_type_allowed("IMAGE/PNG"));
        assert!(!upload.is_type_allowed("application/x-msdownload"));
    }

    #[test]
    fn test_logging_filter_directive() {
        let mut logging = LoggingConfig::default();
        assert_eq!(
            logging.filter_directive(),
            "paperless_gateway=info,tower_http=info"
        );
        logging.level = "warning".to_string();
        assert!(logging.filter_directive().starts_with("paperless_gateway=warn"));
        logging.enabled = false;
        assert_eq!(logging.filter_directive(), "off");
    }
}
