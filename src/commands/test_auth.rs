//! `test-auth`: check the gateway accepts the configured credentials
//!
//! Prints the inbound authentication settings, then calls
//! `<url>/api/paperless/test-connection` on a running gateway with the chosen
//! method.

use anyhow::{anyhow, bail, Context};
use clap::Args;
use reqwest::{Client, RequestBuilder};
use std::io::Write;
use std::time::Duration;

use crate::api::API_PREFIX;
use crate::config::{AuthMethod, Config};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Args)]
pub struct TestAuthArgs {
    /// Authentication method to test (session, token, basic, none)
    #[arg(long)]
    pub method: Option<String>,

    /// API token to test with
    #[arg(long, env = "PAPERLESS_TEST_TOKEN")]
    pub token: Option<String>,

    /// Username for basic auth
    #[arg(long)]
    pub username: Option<String>,

    /// Password for basic auth
    #[arg(long, env = "PAPERLESS_TEST_PASSWORD")]
    pub password: Option<String>,

    /// Base URL of the running gateway (defaults to the configured listener)
    #[arg(long)]
    pub url: Option<String>,
}

/// Base URL of the gateway as seen from this machine
fn gateway_url(args: &TestAuthArgs, config: &Config) -> String {
    let url = args.url.clone().unwrap_or_else(|| {
        let host = match config.server.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        format!("http://{}:{}", host, config.server.port)
    });
    url.trim_end_matches('/').to_string()
}

/// First eight characters followed by an ellipsis
fn preview(token: &str) -> String {
    let head: String = token.chars().take(8).collect();
    format!("{}...", head)
}

pub async fn run<W: Write>(args: &TestAuthArgs, config: &Config, out: &mut W) -> anyhow::Result<()> {
    let auth = &config.api_auth;
    let method = args
        .method
        .as_deref()
        .map(|m| m.parse::<AuthMethod>().unwrap_or(AuthMethod::Unsupported))
        .unwrap_or(auth.method);

    writeln!(out, "Testing Paperless-ngx API Authentication")?;
    writeln!(out)?;
    writeln!(out, "Current Configuration:")?;
    writeln!(out, "  Authentication Enabled: {}", yes_no(auth.enabled))?;
    writeln!(out, "  Method:                 {}", method)?;
    writeln!(out, "  Rate Limiting:          {}", yes_no(auth.rate_limit.enabled))?;
    let allowlist = if auth.ip_allowlist.is_empty() {
        "None".to_string()
    } else {
        auth.ip_allowlist.join(", ")
    };
    writeln!(out, "  IP Allowlist:           {}", allowlist)?;

    if !auth.enabled {
        writeln!(out, "Authentication is disabled. API is open to all requests.")?;
        return Ok(());
    }
    writeln!(out)?;

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let endpoint = format!("{}{}/test-connection", gateway_url(args, config), API_PREFIX);

    match method {
        AuthMethod::Session => {
            writeln!(out, "Testing Session Authentication...")?;
            writeln!(
                out,
                "Session authentication relies on an upstream layer establishing the caller's identity."
            )?;
            writeln!(out, "Test it through that layer (login page or SSO proxy) instead.")?;
            Ok(())
        }
        AuthMethod::Token => test_token(args, config, &client, &endpoint, out).await,
        AuthMethod::Basic => {
            writeln!(out, "Testing Basic Authentication...")?;
            let username = args.username.clone().or_else(|| auth.basic.username.clone());
            let password = args.password.clone().or_else(|| auth.basic.password.clone());
            let (Some(username), Some(password)) = (
                username.filter(|u| !u.is_empty()),
                password.filter(|p| !p.is_empty()),
            ) else {
                bail!("Basic auth credentials not configured. Use --username and --password or configure PAPERLESS_API_USERNAME and PAPERLESS_API_PASSWORD.");
            };
            writeln!(out, "Testing with username: {}", username)?;
            let request = client.get(&endpoint).basic_auth(username, Some(password));
            check(request, "Basic", out).await
        }
        AuthMethod::None => {
            writeln!(out, "Testing No Authentication...")?;
            check(client.get(&endpoint), "No", out).await
        }
        AuthMethod::Unsupported => {
            let requested = args.method.as_deref().unwrap_or("unsupported");
            bail!("Unknown authentication method: {}", requested)
        }
    }
}

async fn test_token<W: Write>(
    args: &TestAuthArgs,
    config: &Config,
    client: &Client,
    endpoint: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    writeln!(out, "Testing Token Authentication...")?;

    let tokens: Vec<String> = match &args.token {
        Some(token) => vec![token.clone()],
        None => config
            .api_auth
            .token
            .tokens
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect(),
    };
    if tokens.is_empty() {
        bail!("No API tokens configured. Use --token or configure PAPERLESS_API_TOKENS.");
    }

    let header = &config.api_auth.token.header_name;
    for token in &tokens {
        writeln!(out, "Testing token: {}", preview(token))?;
        match client.get(endpoint).header(header.as_str(), token).send().await {
            Ok(response) if response.status().is_success() => {
                writeln!(out, "✓ Token authentication successful")?;
                return Ok(());
            }
            Ok(response) => {
                writeln!(out, "✗ Token authentication failed: {}", response.status().as_u16())?;
            }
            Err(e) => {
                writeln!(out, "✗ Token authentication error: {}", e)?;
            }
        }
    }

    Err(anyhow!("All token authentication tests failed"))
}

async fn check<W: Write>(request: RequestBuilder, label: &str, out: &mut W) -> anyhow::Result<()> {
    let response = request
        .send()
        .await
        .with_context(|| format!("✗ {} authentication error", label))?;

    let status = response.status();
    if status.is_success() {
        writeln!(out, "✓ {} authentication successful", label)?;
        Ok(())
    } else {
        bail!("✗ {} authentication failed: {}", label, status.as_u16())
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::BASE64;
    use httpmock::prelude::*;

    fn args_for(server: &MockServer) -> TestAuthArgs {
        TestAuthArgs {
            method: None,
            token: None,
            username: None,
            password: None,
            url: Some(server.base_url()),
        }
    }

    #[tokio::test]
    async fn test_token_tries_each_configured_token() {
        let server = MockServer::start_async().await;
        let rejected = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/paperless/test-connection")
                    .header("x-paperless-token", "stale-token");
                then.status(401);
            })
            .await;
        let accepted = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/paperless/test-connection")
                    .header("x-paperless-token", "fresh-token");
                then.status(200).json_body(serde_json::json!({"success": true}));
            })
            .await;

        let mut config = Config::default();
        config.api_auth.token.tokens = vec!["stale-token".to_string(), "fresh-token".to_string()];

        let mut out = Vec::new();
        run(&args_for(&server), &config, &mut out).await.unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("✗ Token authentication failed: 401"));
        assert!(output.contains("✓ Token authentication successful"));
        assert!(output.contains("Testing token: stale-to..."));
        rejected.assert_async().await;
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_fails_when_none_configured() {
        let server = MockServer::start_async().await;
        let err = run(&args_for(&server), &Config::default(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No API tokens configured"));
    }

    #[tokio::test]
    async fn test_basic_uses_command_line_credentials() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/paperless/test-connection")
                    .header(
                        "authorization",
                        format!("Basic {}", BASE64.encode(b"admin:hunter2")),
                    );
                then.status(200);
            })
            .await;

        let mut args = args_for(&server);
        args.method = Some("basic".to_string());
        args.username = Some("admin".to_string());
        args.password = Some("hunter2".to_string());

        run(&args, &Config::default(), &mut Vec::new()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_method_and_disabled_auth() {
        let server = MockServer::start_async().await;
        let mut args = args_for(&server);
        args.method = Some("kerberos".to_string());
        let err = run(&args, &Config::default(), &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown authentication method: kerberos");

        let mut config = Config::default();
        config.api_auth.enabled = false;
        let mut out = Vec::new();
        run(&args, &config, &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Authentication is disabled"));
    }

    #[test]
    fn test_gateway_url_defaults_to_listener() {
        let args = TestAuthArgs {
            method: None,
            token: None,
            username: None,
            password: None,
            url: None,
        };
        let mut config = Config::default();
        config.server.port = 9090;
        assert_eq!(gateway_url(&args, &config), "http://127.0.0.1:9090");
    }
}
