//! Paperless gateway - authenticated HTTP front for a Paperless-ngx server

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperless_gateway::{
    api::{self, AppState},
    config::Config,
    services::PaperlessService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the configured log level can apply
    let config = Config::load_with_env(Path::new("config.yml"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let span = tracing::info_span!("server", channel = %config.logging.channel);
    run(config).instrument(span).await
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(
        base_url = %config.paperless.base_url,
        auth_method = %config.api_auth.method,
        "Starting Paperless gateway"
    );

    let paperless =
        PaperlessService::new(&config.paperless).context("Failed to build Paperless-ngx client")?;
    let state = AppState::new(paperless, &config).context("Invalid api_auth.ip_allowlist")?;

    // Drop expired rate-limit windows every 5 minutes
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
