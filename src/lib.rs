//! Paperless gateway - Paperless-ngx API client, HTTP gateway and CLI
//!
//! The [`services::PaperlessService`] client talks to a Paperless-ngx server;
//! the [`api`] router exposes a guarded subset of it over HTTP.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
