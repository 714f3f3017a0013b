//! Server startup: shared state initialization and background task spawning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use smartd_connector::ConnectorFactory;

use crate::databases::DatabaseStore;
use crate::sessions::SessionRegistry;
use crate::state::AppState;
use crate::users::UserStore;

/// How often idle sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build `AppState`, opening the JSON stores under the data directory.
pub fn build_app_state(
    config: &smartd_core::Config,
    connectors: Arc<dyn ConnectorFactory>,
) -> anyhow::Result<Arc<AppState>> {
    let data_dir = &config.storage.data_dir;
    let users = UserStore::new(data_dir)?;
    let databases = DatabaseStore::new(data_dir)?;
    info!("Stores initialized (data_dir: {})", data_dir.display());

    Ok(Arc::new(AppState {
        config: config.clone(),
        users: Arc::new(RwLock::new(users)),
        databases: Arc::new(RwLock::new(databases)),
        sessions: SessionRegistry::new(Duration::from_secs(config.session.ttl_secs)),
        connectors,
    }))
}

/// Periodically drop expired sessions so their connectors get closed.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            state.sessions.purge_expired().await;
        }
    })
}
