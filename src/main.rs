use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wellness_companion::config::Config;
use wellness_companion::server;
use wellness_companion::service::CompanionService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    // Missing credentials halt here, before anything is served
    if let Err(e) = config.ensure_credentials() {
        tracing::error!("Startup aborted: {}", e);
        return Err(e.into());
    }

    let shutdown = CancellationToken::new();
    let service = Arc::new(CompanionService::new(&config, shutdown.clone())?);

    let bind: SocketAddr = config.server.bind.parse().map_err(|e| {
        anyhow::anyhow!("Invalid bind address {}: {e}", config.server.bind)
    })?;
    let router = server::router(Arc::clone(&service), config.server.bearer_token.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        %bind,
        model = %config.gemini.model,
        videos = config.video.api_key.is_some(),
        auth = %config.server.bearer_token.as_deref().map(|_| "bearer").unwrap_or("none"),
        "Starting wellness companion"
    );

    let sweeper = Arc::clone(&service);
    let sweep_token = shutdown.clone();
    let (ttl, every) = (config.session_ttl(), config.session_sweep_interval());
    tokio::spawn(async move {
        sweeper.sessions().sweep_idle(ttl, every, &sweep_token).await;
    });

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, cancelling in-flight generations");
            signal.cancel();
        }
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}
