//! Neo4j connector backed by `neo4rs`.
//!
//! The driver opens Bolt connections lazily, so building a connector only
//! validates the target; the first query (usually [`GraphConnector::ping`])
//! is what actually reaches the server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{query, Graph, Query, Row};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use smartd_core::{display_name, quote_identifier, GraphNode, GraphRelationship, RelationshipEntry};

use crate::connector::{ConnectorError, ConnectorFactory, GraphConnector};
use crate::target::ConnectionTarget;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper around a `neo4rs` driver handle.
pub struct Neo4jConnector {
    uri: String,
    graph: RwLock<Option<Graph>>,
    timeout: Duration,
}

impl Neo4jConnector {
    /// Build a driver handle for `uri` using basic auth.
    pub fn new(uri: &str, username: &str, password: &str) -> Result<Self, ConnectorError> {
        let target = ConnectionTarget::parse(uri, username, password)?;
        Self::from_target(&target)
    }

    pub fn from_target(target: &ConnectionTarget) -> Result<Self, ConnectorError> {
        let graph = Graph::new(&target.uri, &target.username, &target.password)?;
        debug!(uri = %target.uri, user = %target.username, "Neo4j driver created");
        Ok(Self {
            uri: target.uri.clone(),
            graph: RwLock::new(Some(graph)),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Bound every round-trip to the server by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn graph(&self) -> Result<Graph, ConnectorError> {
        self.graph.read().await.clone().ok_or(ConnectorError::Closed)
    }

    /// Execute `q` and collect all rows, bounded by the connector timeout.
    async fn fetch_rows(&self, q: Query) -> Result<Vec<Row>, ConnectorError> {
        let graph = self.graph().await?;
        let fetch = async {
            let mut stream = graph.execute(q).await?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await? {
                rows.push(row);
            }
            Ok::<_, ConnectorError>(rows)
        };
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ConnectorError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn fetch_strings(&self, cypher: &str, column: &str) -> Result<Vec<String>, ConnectorError> {
        let rows = self.fetch_rows(query(cypher)).await?;
        rows.iter().map(|row| get_column::<String>(row, column)).collect()
    }
}

fn get_column<T: serde::de::DeserializeOwned>(row: &Row, column: &str) -> Result<T, ConnectorError> {
    row.get::<T>(column)
        .map_err(|e| ConnectorError::Decode(format!("column '{}': {}", column, e)))
}

fn limit_param(limit: u64) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl GraphConnector for Neo4jConnector {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn close(&self) {
        if self.graph.write().await.take().is_some() {
            info!(uri = %self.uri, "Neo4j connection closed");
        }
    }

    async fn is_closed(&self) -> bool {
        self.graph.read().await.is_none()
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let rows = self.fetch_rows(query("RETURN 1 AS ok")).await.map_err(|e| {
            warn!(uri = %self.uri, error = %e, "Neo4j connection test failed");
            e
        })?;
        if rows.is_empty() {
            return Err(ConnectorError::Decode("RETURN 1 produced no rows".to_string()));
        }
        Ok(())
    }

    async fn labels(&self) -> Result<Vec<String>, ConnectorError> {
        self.fetch_strings("CALL db.labels() YIELD label RETURN label ORDER BY label", "label")
            .await
    }

    async fn relationship_types(&self) -> Result<Vec<String>, ConnectorError> {
        self.fetch_strings(
            "CALL db.relationshipTypes() YIELD relationshipType \
             RETURN relationshipType ORDER BY relationshipType",
            "relationshipType",
        )
        .await
    }

    async fn property_keys(&self) -> Result<Vec<String>, ConnectorError> {
        self.fetch_strings(
            "CALL db.propertyKeys() YIELD propertyKey RETURN propertyKey ORDER BY propertyKey",
            "propertyKey",
        )
        .await
    }

    async fn node_entities(&self, label: &str, limit: u64) -> Result<Vec<GraphNode>, ConnectorError> {
        let cypher = format!(
            "MATCH (n:{}) RETURN id(n) AS id, properties(n) AS props ORDER BY id LIMIT $limit",
            quote_identifier(label)?
        );
        let rows = self.fetch_rows(query(&cypher).param("limit", limit_param(limit))).await?;

        rows.iter()
            .map(|row| {
                Ok(GraphNode {
                    id: get_column(row, "id")?,
                    node_label: label.to_string(),
                    properties: get_column::<Map<String, Value>>(row, "props")?,
                })
            })
            .collect()
    }

    async fn relationship_entities(
        &self,
        rel_type: &str,
        limit: u64,
    ) -> Result<Vec<RelationshipEntry>, ConnectorError> {
        let cypher = format!(
            "MATCH (a)-[r:{}]->(b) \
             RETURN id(r) AS id, id(a) AS start_id, id(b) AS end_id, \
                    head(labels(a)) AS start_label, head(labels(b)) AS end_label, \
                    properties(a) AS start_props, properties(b) AS end_props, \
                    properties(r) AS props \
             ORDER BY id LIMIT $limit",
            quote_identifier(rel_type)?
        );
        let rows = self.fetch_rows(query(&cypher).param("limit", limit_param(limit))).await?;

        rows.iter()
            .map(|row| {
                let start_id: i64 = get_column(row, "start_id")?;
                let end_id: i64 = get_column(row, "end_id")?;
                let start_label: Option<String> = get_column(row, "start_label")?;
                let end_label: Option<String> = get_column(row, "end_label")?;
                let start_props: Map<String, Value> = get_column(row, "start_props")?;
                let end_props: Map<String, Value> = get_column(row, "end_props")?;
                Ok(RelationshipEntry {
                    start_name: display_name(&start_props, start_label.as_deref().unwrap_or("Node"), start_id),
                    end_name: display_name(&end_props, end_label.as_deref().unwrap_or("Node"), end_id),
                    relationship: GraphRelationship {
                        id: get_column(row, "id")?,
                        start_node: start_id,
                        end_node: end_id,
                        rel_type: rel_type.to_string(),
                        properties: get_column(row, "props")?,
                    },
                })
            })
            .collect()
    }
}

/// Production factory: one `neo4rs` driver per target.
pub struct Neo4jConnectorFactory {
    timeout: Duration,
}

impl Neo4jConnectorFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for Neo4jConnectorFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ConnectorFactory for Neo4jConnectorFactory {
    fn connect(&self, target: &ConnectionTarget) -> Result<Arc<dyn GraphConnector>, ConnectorError> {
        let connector = Neo4jConnector::from_target(target)?.with_timeout(self.timeout);
        Ok(Arc::new(connector))
    }
}
