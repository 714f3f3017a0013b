//! Connector trait and shared error type.

use std::sync::Arc;

use async_trait::async_trait;

use smartd_core::{DatabaseInfo, GraphNode, RelationshipEntry, SmartdError};

use crate::target::ConnectionTarget;

/// Message reported by a successful [`GraphConnector::test_connection`].
pub const CONNECTION_OK: &str = "Connection successful";

/// Errors that can occur while talking to a graph database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The URI is malformed or uses an unsupported scheme.
    #[error("Invalid connection URI: {0}")]
    InvalidUri(String),

    /// A label, relationship type or other argument was rejected.
    #[error(transparent)]
    InvalidInput(#[from] SmartdError),

    /// The connector was closed and can no longer run queries.
    #[error("Connection is closed")]
    Closed,

    /// The server did not answer within the configured timeout.
    #[error("Timed out after {0}s waiting for the database")]
    Timeout(u64),

    /// Error reported by the Neo4j driver.
    #[error("{0}")]
    Neo4j(#[from] neo4rs::Error),

    /// A result row did not have the expected shape.
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// The server refused the connection (in-memory graphs only).
    #[error("{0}")]
    Refused(String),
}

/// A live handle to one graph database.
#[async_trait]
pub trait GraphConnector: Send + Sync {
    /// URI this connector was built from.
    fn uri(&self) -> &str;

    /// Release the driver handle. Safe to call more than once.
    async fn close(&self);

    async fn is_closed(&self) -> bool;

    /// Run the trivial `RETURN 1` probe.
    async fn ping(&self) -> Result<(), ConnectorError>;

    /// Health check reported as `(ok, message)`; never fails.
    async fn test_connection(&self) -> (bool, String) {
        match self.ping().await {
            Ok(()) => (true, CONNECTION_OK.to_string()),
            Err(e) => (false, e.to_string()),
        }
    }

    async fn labels(&self) -> Result<Vec<String>, ConnectorError>;

    async fn relationship_types(&self) -> Result<Vec<String>, ConnectorError>;

    async fn property_keys(&self) -> Result<Vec<String>, ConnectorError>;

    /// Labels, relationship types and property keys in one call.
    async fn database_info(&self) -> Result<DatabaseInfo, ConnectorError> {
        Ok(DatabaseInfo {
            labels: self.labels().await?,
            relationship_types: self.relationship_types().await?,
            property_keys: self.property_keys().await?,
        })
    }

    /// Up to `limit` nodes carrying `label`, ordered by id.
    async fn node_entities(&self, label: &str, limit: u64) -> Result<Vec<GraphNode>, ConnectorError>;

    /// Up to `limit` relationships of `rel_type`, ordered by id.
    async fn relationship_entities(
        &self,
        rel_type: &str,
        limit: u64,
    ) -> Result<Vec<RelationshipEntry>, ConnectorError>;
}

/// Builds connectors for user-supplied targets.
pub trait ConnectorFactory: Send + Sync {
    fn connect(&self, target: &ConnectionTarget) -> Result<Arc<dyn GraphConnector>, ConnectorError>;
}
