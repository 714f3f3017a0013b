//! In-memory graph connector for tests and local development.
//!
//! [`MemoryConnectorFactory`] plays the role of a set of Neo4j servers: each
//! registered URI has credentials and a fixed [`MemoryDataset`]. Connecting to
//! an unknown URI or with the wrong password behaves like the real driver: the
//! connector is created, and the first query fails.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use smartd_core::{quote_identifier, GraphNode, GraphRelationship, RelationshipEntry};

use crate::connector::{ConnectorError, ConnectorFactory, GraphConnector};
use crate::target::ConnectionTarget;

/// Nodes and relationships served by a [`MemoryGraph`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    nodes: Vec<GraphNode>,
    relationships: Vec<GraphRelationship>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: i64, label: &str, properties: Value) -> Self {
        self.nodes.push(GraphNode {
            id,
            node_label: label.to_string(),
            properties: into_map(properties),
        });
        self
    }

    pub fn with_relationship(mut self, id: i64, start: i64, end: i64, rel_type: &str, properties: Value) -> Self {
        self.relationships.push(GraphRelationship {
            id,
            start_node: start,
            end_node: end,
            rel_type: rel_type.to_string(),
            properties: into_map(properties),
        });
        self
    }

    fn node(&self, id: i64) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Clone)]
struct MemoryServer {
    username: String,
    password: String,
    dataset: Arc<MemoryDataset>,
}

/// A connector over one in-memory dataset.
pub struct MemoryGraph {
    target: ConnectionTarget,
    server: Option<MemoryServer>,
    closed: AtomicBool,
}

impl MemoryGraph {
    fn dataset(&self) -> Result<&MemoryDataset, ConnectorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectorError::Closed);
        }
        let server = self.server.as_ref().ok_or_else(|| {
            ConnectorError::Refused(format!("Couldn't connect to {}", self.target.uri))
        })?;
        if server.username != self.target.username || server.password != self.target.password {
            return Err(ConnectorError::Refused(
                "The client is unauthorized due to authentication failure.".to_string(),
            ));
        }
        Ok(&server.dataset)
    }
}

#[async_trait]
impl GraphConnector for MemoryGraph {
    fn uri(&self) -> &str {
        &self.target.uri
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        self.dataset().map(|_| ())
    }

    async fn labels(&self) -> Result<Vec<String>, ConnectorError> {
        let ds = self.dataset()?;
        let set: BTreeSet<String> = ds.nodes.iter().map(|n| n.node_label.clone()).collect();
        Ok(set.into_iter().collect())
    }

    async fn relationship_types(&self) -> Result<Vec<String>, ConnectorError> {
        let ds = self.dataset()?;
        let set: BTreeSet<String> = ds.relationships.iter().map(|r| r.rel_type.clone()).collect();
        Ok(set.into_iter().collect())
    }

    async fn property_keys(&self) -> Result<Vec<String>, ConnectorError> {
        let ds = self.dataset()?;
        let set: BTreeSet<String> = ds
            .nodes
            .iter()
            .flat_map(|n| n.properties.keys())
            .chain(ds.relationships.iter().flat_map(|r| r.properties.keys()))
            .cloned()
            .collect();
        Ok(set.into_iter().collect())
    }

    async fn node_entities(&self, label: &str, limit: u64) -> Result<Vec<GraphNode>, ConnectorError> {
        quote_identifier(label)?;
        let ds = self.dataset()?;
        let mut nodes: Vec<GraphNode> = ds.nodes.iter().filter(|n| n.node_label == label).cloned().collect();
        nodes.sort_by_key(|n| n.id);
        nodes.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(nodes)
    }

    async fn relationship_entities(
        &self,
        rel_type: &str,
        limit: u64,
    ) -> Result<Vec<RelationshipEntry>, ConnectorError> {
        quote_identifier(rel_type)?;
        let ds = self.dataset()?;
        let mut rels: Vec<&GraphRelationship> = ds.relationships.iter().filter(|r| r.rel_type == rel_type).collect();
        rels.sort_by_key(|r| r.id);

        Ok(rels
            .into_iter()
            .filter_map(|r| {
                // A dangling edge would not survive a MATCH on both endpoints.
                let start = ds.node(r.start_node)?;
                let end = ds.node(r.end_node)?;
                Some(RelationshipEntry {
                    start_name: start.display_name(),
                    end_name: end.display_name(),
                    relationship: r.clone(),
                })
            })
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }
}

/// A registry of fake servers, handing out [`MemoryGraph`] connectors.
#[derive(Default)]
pub struct MemoryConnectorFactory {
    servers: Mutex<HashMap<String, MemoryServer>>,
    issued: Mutex<Vec<Arc<MemoryGraph>>>,
}

impl MemoryConnectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reachable server at `uri` accepting `username`/`password`.
    pub fn add_server(&self, uri: &str, username: &str, password: &str, dataset: MemoryDataset) {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner).insert(
            uri.to_string(),
            MemoryServer {
                username: username.to_string(),
                password: password.to_string(),
                dataset: Arc::new(dataset),
            },
        );
    }

    /// Every connector handed out so far, oldest first.
    pub fn issued(&self) -> Vec<Arc<MemoryGraph>> {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ConnectorFactory for MemoryConnectorFactory {
    fn connect(&self, target: &ConnectionTarget) -> Result<Arc<dyn GraphConnector>, ConnectorError> {
        let server = self
            .servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target.uri)
            .cloned();
        let graph = Arc::new(MemoryGraph {
            target: target.clone(),
            server,
            closed: AtomicBool::new(false),
        });
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).push(graph.clone());
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URI: &str = "bolt://graph.test:7687";

    fn people() -> MemoryDataset {
        MemoryDataset::new()
            .with_node(1, "PERSON", json!({"name": "Alice", "age": 30}))
            .with_node(2, "PERSON", json!({"name": "Bob", "age": 25}))
            .with_node(3, "KNOWLEDGE", json!({"title": "Graph Database"}))
            .with_relationship(10, 1, 2, "FRIEND", json!({"since": "2020"}))
            .with_relationship(11, 1, 3, "LIKES", json!({"frequency": "Monthly"}))
            .with_relationship(12, 2, 3, "LIKES", json!({}))
    }

    fn connect(factory: &MemoryConnectorFactory, password: &str) -> Arc<dyn GraphConnector> {
        let target = ConnectionTarget::parse(URI, "neo4j", password).unwrap();
        factory.connect(&target).unwrap()
    }

    #[tokio::test]
    async fn test_connection_succeeds_with_valid_credentials() {
        let factory = MemoryConnectorFactory::new();
        factory.add_server(URI, "neo4j", "secret", people());
        let conn = connect(&factory, "secret");
        assert_eq!(conn.test_connection().await, (true, "Connection successful".to_string()));
    }

    #[tokio::test]
    async fn test_connection_reports_failures_as_text() {
        let factory = MemoryConnectorFactory::new();
        factory.add_server(URI, "neo4j", "secret", people());

        let (ok, msg) = connect(&factory, "wrong").test_connection().await;
        assert!(!ok);
        assert!(msg.contains("authentication failure"));

        let target = ConnectionTarget::parse("bolt://nowhere.test:7687", "neo4j", "x").unwrap();
        let (ok, msg) = factory.connect(&target).unwrap().test_connection().await;
        assert!(!ok);
        assert!(msg.contains("nowhere.test"));
    }

    #[tokio::test]
    async fn schema_listing_is_sorted_and_deduplicated() {
        let factory = MemoryConnectorFactory::new();
        factory.add_server(URI, "neo4j", "secret", people());
        let info = connect(&factory, "secret").database_info().await.unwrap();
        assert_eq!(info.labels, vec!["KNOWLEDGE", "PERSON"]);
        assert_eq!(info.relationship_types, vec!["FRIEND", "LIKES"]);
        assert_eq!(info.property_keys, vec!["age", "frequency", "name", "since", "title"]);
    }

    #[tokio::test]
    async fn entity_listings_respect_label_and_limit() {
        let factory = MemoryConnectorFactory::new();
        factory.add_server(URI, "neo4j", "secret", people());
        let conn = connect(&factory, "secret");

        let nodes = conn.node_entities("PERSON", 1).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].display_name(), "Alice");

        let likes = conn.relationship_entities("LIKES", 10).await.unwrap();
        assert_eq!(likes.len(), 2);
        assert_eq!(likes[0].start_name, "Alice");
        assert_eq!(likes[0].end_name, "Graph Database");
        assert_eq!(likes[1].start_name, "Bob");
    }

    #[tokio::test]
    async fn closed_connector_refuses_queries() {
        let factory = MemoryConnectorFactory::new();
        factory.add_server(URI, "neo4j", "secret", people());
        let conn = connect(&factory, "secret");
        conn.close().await;
        assert!(conn.is_closed().await);
        assert!(factory.issued()[0].is_closed().await);
        assert!(matches!(conn.labels().await, Err(ConnectorError::Closed)));
    }
}
