//! Validated connection parameters for a Neo4j server.

use crate::connector::ConnectorError;

/// URI schemes understood by the Neo4j driver.
pub const SUPPORTED_SCHEMES: &[&str] = &["neo4j", "neo4j+s", "neo4j+ssc", "bolt", "bolt+s", "bolt+ssc"];

/// Where and how to connect: URI plus basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

impl ConnectionTarget {
    /// Validate and normalize a target. The URI is trimmed and loses any
    /// trailing slash so the same server always maps to the same string.
    pub fn parse(uri: &str, username: &str, password: &str) -> Result<Self, ConnectorError> {
        let uri = normalize_uri(uri)?;
        if username.trim().is_empty() {
            return Err(ConnectorError::InvalidUri("username must not be empty".to_string()));
        }
        Ok(Self {
            uri,
            username: username.trim().to_string(),
            password: password.to_string(),
        })
    }
}

/// Check scheme and host, returning the canonical form of `uri`.
pub fn normalize_uri(uri: &str) -> Result<String, ConnectorError> {
    let trimmed = uri.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConnectorError::InvalidUri("URI must not be empty".to_string()));
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| ConnectorError::InvalidUri(format!("{}: {}", trimmed, e)))?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ConnectorError::InvalidUri(format!(
            "unsupported scheme '{}' (expected one of {})",
            parsed.scheme(),
            SUPPORTED_SCHEMES.join(", ")
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ConnectorError::InvalidUri(format!("{} has no host", trimmed)));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(ConnectorError::InvalidUri(
            "credentials belong in the username/password fields, not the URI".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}
