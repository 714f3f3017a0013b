use std::sync::Arc;

use tokio::sync::RwLock;

use smartd_connector::ConnectorFactory;

use crate::databases::DatabaseStore;
use crate::sessions::SessionRegistry;
use crate::users::UserStore;

pub struct AppState {
    pub config: smartd_core::Config,
    pub users: Arc<RwLock<UserStore>>,
    pub databases: Arc<RwLock<DatabaseStore>>,
    pub sessions: SessionRegistry,
    pub connectors: Arc<dyn ConnectorFactory>,
}
