//! Neo4j connectivity for SMARTD Studio.
//!
//! [`Neo4jConnector`] wraps a `neo4rs` driver handle. The server only talks to
//! the [`GraphConnector`] trait so tests can swap in the in-memory graphs of
//! the `memory` module (enabled by the `test-util` feature).

pub mod connector;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod neo4j;
pub mod target;

pub use connector::{ConnectorError, ConnectorFactory, GraphConnector, CONNECTION_OK};
pub use neo4j::{Neo4jConnector, Neo4jConnectorFactory};
pub use target::ConnectionTarget;
