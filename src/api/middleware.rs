//! API middleware
//!
//! Guards every gateway route. Per request, in order:
//! 1. authentication disabled: pass through
//! 2. IP allowlist
//! 3. rate limiting per client IP
//! 4. the configured authentication method
//!
//! Each step short-circuits with a JSON error response.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use data_encoding::BASE64;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};

use crate::config::{ApiAuthConfig, AuthMethod, Config, MappingsConfig};
use crate::services::{ApiRateLimiter, IpAllowlist, IpRuleError, PaperlessService, RateLimitDecision};

/// Application state shared by all routes
#[derive(Clone)]
pub struct AppState {
    pub paperless: Arc<PaperlessService>,
    pub auth: Arc<GatewayAuth>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub mappings: Arc<MappingsConfig>,
}

impl AppState {
    pub fn new(paperless: PaperlessService, config: &Config) -> Result<Self, IpRuleError> {
        let rate_limit = &config.api_auth.rate_limit;
        Ok(Self {
            paperless: Arc::new(paperless),
            auth: Arc::new(GatewayAuth::new(config.api_auth.clone())?),
            rate_limiter: Arc::new(ApiRateLimiter::new(
                rate_limit.max_attempts,
                rate_limit.decay(),
            )),
            mappings: Arc::new(config.paperless.mappings.clone()),
        })
    }
}

/// Inbound authentication settings with the allowlist parsed once
#[derive(Debug, Clone)]
pub struct GatewayAuth {
    pub config: ApiAuthConfig,
    pub allowlist: IpAllowlist,
}

impl GatewayAuth {
    pub fn new(config: ApiAuthConfig) -> Result<Self, IpRuleError> {
        let allowlist = IpAllowlist::from_entries(&config.ip_allowlist)?;
        Ok(Self { config, allowlist })
    }
}

/// Identity established by an upstream layer (session login, SSO proxy).
///
/// The `session` method only admits requests carrying this extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
}

// ============================================================================
// Client IP
// ============================================================================

/// Address of the client.
///
/// Proxy headers are only honoured when trusted; otherwise the socket peer is
/// used.
pub fn client_ip(request: &Request, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return Some(ip);
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_forwarded: Option<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    from_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    })
}

// ============================================================================
// Responses
// ============================================================================

fn unauthorized(message: impl Into<String>) -> Response {
    let body = json!({
        "success": false,
        "message": message.into(),
        "error": "authentication_required",
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn rate_limited(limit: u32, retry_after: u64, reset_at: u64) -> Response {
    let body = json!({
        "success": false,
        "message": "Rate limit exceeded. Please try again later.",
        "retry_after": retry_after,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));
    response
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware for the gateway routes
pub async fn paperless_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth = &state.auth.config;
    if !auth.enabled {
        return next.run(request).await;
    }

    let ip = client_ip(&request, auth.trust_proxy_headers);
    let ip_label = ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string());
    let endpoint = request.uri().path().to_string();

    if !state.auth.allowlist.allows(ip) {
        tracing::warn!(ip = %ip_label, endpoint = %endpoint, "IP not in allowlist");
        return unauthorized("IP address not allowed");
    }

    if auth.rate_limit.enabled {
        let key = format!("paperless-api:{}", ip_label);
        if let RateLimitDecision::Limited { retry_after, reset_at } = state.rate_limiter.hit(&key).await {
            tracing::warn!(ip = %ip_label, endpoint = %endpoint, "Rate limit exceeded");
            return rate_limited(state.rate_limiter.max_attempts(), retry_after, reset_at);
        }
    }

    let verdict = match auth.method {
        AuthMethod::None => Ok("none"),
        AuthMethod::Session => check_session(&request),
        AuthMethod::Token => check_token(auth, request.headers()),
        AuthMethod::Basic => check_basic(auth, request.headers()),
        AuthMethod::Unsupported => Err(unauthorized("Invalid authentication method")),
    };

    match verdict {
        Ok(method) => {
            tracing::info!(ip = %ip_label, endpoint = %endpoint, method, "Paperless API accessed");
            next.run(request).await
        }
        Err(response) => {
            tracing::warn!(ip = %ip_label, endpoint = %endpoint, method = %auth.method, "Paperless API authentication failed");
            response
        }
    }
}

fn check_session(request: &Request) -> Result<&'static str, Response> {
    match request.extensions().get::<AuthenticatedIdentity>() {
        Some(identity) => {
            tracing::debug!(subject = %identity.subject, "Session identity present");
            Ok("session")
        }
        None => Err(unauthorized("Session authentication required")),
    }
}

fn check_token(auth: &ApiAuthConfig, headers: &HeaderMap) -> Result<&'static str, Response> {
    let header_name = &auth.token.header_name;
    let provided = headers
        .get(header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| unauthorized(format!("Missing {} header", header_name)))?;

    let tokens: Vec<&str> = auth
        .token
        .tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        tracing::warn!("No API tokens configured");
        return Err(unauthorized("API tokens not configured"));
    }

    // Compare against every token so timing does not reveal which one matched
    let matched = tokens
        .iter()
        .fold(Choice::from(0), |acc, token| acc | token.as_bytes().ct_eq(provided.as_bytes()));
    if bool::from(matched) {
        Ok("token")
    } else {
        Err(unauthorized("Invalid API token"))
    }
}

fn check_basic(auth: &ApiAuthConfig, headers: &HeaderMap) -> Result<&'static str, Response> {
    let (Some(username), Some(password)) = (
        auth.basic.username.as_deref().filter(|u| !u.is_empty()),
        auth.basic.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        tracing::warn!("Basic auth credentials not configured");
        return Err(unauthorized("Basic authentication not configured"));
    };

    let expected = format!("{}:{}", username, password);
    let provided = basic_credentials(headers).unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok("basic")
    } else {
        let mut response = unauthorized("Invalid credentials");
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"Paperless API\""),
        );
        Err(response)
    }
}

/// Decoded `user:password` from an `Authorization: Basic` header
fn basic_credentials(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    String::from_utf8(decoded).ok()
}
