//! CLI argument parsing and subcommand dispatch.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use smartd_connector::{GraphConnector, Neo4jConnector};

/// SMARTD Studio backend: accounts, saved Neo4j databases and graph browsing.
#[derive(Parser, Debug)]
#[command(name = "smartd-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Run the `RETURN 1` probe against a Neo4j server and exit.
    Check {
        /// Bolt/Neo4j URI; defaults to NEO4J_URI.
        #[arg(long)]
        uri: Option<String>,
        /// Defaults to NEO4J_USERNAME.
        #[arg(long)]
        username: Option<String>,
        /// Defaults to NEO4J_PASSWORD.
        #[arg(long)]
        password: Option<String>,
    },
}

/// Test connectivity to one Neo4j server, failing if the probe does.
pub async fn check(
    config: &smartd_core::Config,
    uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let neo4j = &config.neo4j;
    let uri = uri
        .or_else(|| neo4j.uri.clone())
        .ok_or_else(|| anyhow::anyhow!("No URI given: pass --uri or set NEO4J_URI"))?;
    let username = username.unwrap_or_else(|| neo4j.username.clone());
    let password = password.or_else(|| neo4j.password.clone()).unwrap_or_default();

    let connector = Neo4jConnector::new(&uri, &username, &password)?
        .with_timeout(Duration::from_secs(neo4j.connect_timeout_secs));
    let (ok, message) = connector.test_connection().await;
    connector.close().await;

    if !ok {
        anyhow::bail!("{}: {}", uri, message);
    }
    info!("{}: {}", uri, message);
    println!("{}", message);
    Ok(())
}
