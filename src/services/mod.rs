//! Services layer
//!
//! - [`paperless`]: the outbound Paperless-ngx API client
//! - [`rate_limiter`]: per-client request counting for the gateway routes
//! - [`ip_filter`]: allowlist matching for the gateway routes

pub mod ip_filter;
pub mod paperless;
pub mod rate_limiter;

pub use ip_filter::{IpAllowlist, IpRule, IpRuleError};
pub use paperless::{Credentials, Filters, Metadata, PaperlessService, Payload, ResourceKind, UploadFile};
pub use rate_limiter::{ApiRateLimiter, RateLimitDecision};
