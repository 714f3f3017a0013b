mod api;
mod app_config;
mod cli;
mod credential_store;
mod databases;
mod router;
mod sessions;
mod startup;
mod state;
mod users;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smartd_connector::Neo4jConnectorFactory;

async fn serve(config: &smartd_core::Config) -> anyhow::Result<()> {
    config.log_summary();

    let connectors = Arc::new(Neo4jConnectorFactory::new(Duration::from_secs(
        config.neo4j.connect_timeout_secs,
    )));
    let state = startup::build_app_state(config, connectors)?;
    let sweeper = startup::spawn_session_sweeper(state.clone());
    let app = router::build_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    state.sessions.close_all().await;
    info!("Server stopped; all Neo4j connections closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let config = app_config::load_config();
    let args = cli::Cli::parse();

    match args.command.unwrap_or(cli::Command::Serve) {
        cli::Command::Serve => serve(&config).await?,
        cli::Command::Check {
            uri,
            username,
            password,
        } => cli::check(&config, uri, username, password).await?,
    }

    Ok(())
}
