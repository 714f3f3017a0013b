//! Graph entity DTOs shared by the connector and the HTTP layer.
//!
//! Field names follow the JSON contract of the playground frontend
//! (`nodeLabel`, `startNode`, `endNode`, `type`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SmartdError;

/// Property keys tried, in order, when picking a node's display name.
pub const DISPLAY_NAME_KEYS: &[&str] = &["name", "title", "id"];

/// A node as shown in the playground graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GraphNode {
    pub id: i64,
    #[serde(rename = "nodeLabel")]
    pub node_label: String,
    #[schema(value_type = Object)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn display_name(&self) -> String {
        display_name(&self.properties, &self.node_label, self.id)
    }
}

/// A directed relationship between two nodes, referenced by node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GraphRelationship {
    pub id: i64,
    #[serde(rename = "startNode")]
    pub start_node: i64,
    #[serde(rename = "endNode")]
    pub end_node: i64,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[schema(value_type = Object)]
    pub properties: Map<String, Value>,
}

/// A relationship together with the display names of both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEntry {
    pub start_name: String,
    pub end_name: String,
    pub relationship: GraphRelationship,
}

/// Schema overview of one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DatabaseInfo {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
    pub property_keys: Vec<String>,
}

/// Pick a human-readable name for a node: the first non-empty property in
/// [`DISPLAY_NAME_KEYS`], falling back to `Label#id`.
pub fn display_name(properties: &Map<String, Value>, label: &str, id: i64) -> String {
    for key in DISPLAY_NAME_KEYS {
        match properties.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            Some(Value::Bool(b)) => return b.to_string(),
            _ => {}
        }
    }
    format!("{}#{}", label, id)
}

/// Quote a label or relationship type for interpolation into Cypher.
///
/// Labels and types cannot be bound as parameters, so the name is wrapped in
/// backticks with embedded backticks doubled.
pub fn quote_identifier(name: &str) -> Result<String, SmartdError> {
    if name.trim().is_empty() {
        return Err(SmartdError::InvalidInput(
            "label or relationship type must not be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(SmartdError::InvalidInput(format!(
            "invalid character in identifier '{}'",
            name.escape_default()
        )));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}
