use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_mcp_gateway::{
    build_app,
    config::GatewayConfig,
    mcp::{Dispatcher, SessionRegistry},
    services::{CityDataset, OpenMeteoClient},
    tools,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_mcp_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::parse();
    config.validate()?;

    // A broken dataset is fatal at startup
    let dataset = CityDataset::load(&config.cities_dataset).with_context(|| {
        format!(
            "Failed to load city dataset from {}",
            config.cities_dataset.display()
        )
    })?;

    let client = OpenMeteoClient::new(
        &config.forecast_url,
        &config.geocoding_url,
        &config.geocoding_language,
        config.http_timeout(),
    );
    let registry = tools::builtin_registry(client, Arc::new(dataset))?;
    tracing::info!(tools = registry.len(), "Tool registry built");

    let sessions = SessionRegistry::new(Arc::new(Dispatcher::new(Arc::new(registry))));

    if let Some(max_idle) = config.session_idle_timeout() {
        tokio::spawn(reap_idle_sessions(sessions.clone(), max_idle));
        tracing::info!(idle_timeout_secs = max_idle.as_secs(), "Idle session reaping enabled");
    }

    let app = build_app(sessions.clone());

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("MCP endpoint: http://{}/mcp", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn reap_idle_sessions(sessions: SessionRegistry, max_idle: Duration) {
    let period = (max_idle / 2).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let reaped = sessions.reap_idle(max_idle);
        if reaped > 0 {
            tracing::debug!(reaped, remaining = sessions.len(), "Idle sweep finished");
        }
    }
}

async fn shutdown_signal(sessions: SessionRegistry) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "Failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }

    let closed = sessions.close_all();
    tracing::info!(closed, "Shutting down, sessions closed");
}
