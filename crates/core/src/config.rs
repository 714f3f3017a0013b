use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub neo4j: Neo4jConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SMARTD_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SMARTD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            session: SessionConfig::from_env_profiled(p),
            neo4j: Neo4jConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{} (cors origin {})", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!("  storage:  data_dir={}", self.storage.data_dir.display());
        tracing::info!("  session:  ttl={}s", self.session.ttl_secs);
        tracing::info!(
            "  neo4j:    uri={}, user={}, timeout={}s, entity_limit={}",
            self.neo4j.uri.as_deref().unwrap_or("(none)"),
            self.neo4j.username,
            self.neo4j.connect_timeout_secs,
            self.neo4j.entity_limit
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "storage": { "data_dir": self.storage.data_dir },
            "neo4j": {
                "configured": self.neo4j.is_configured(),
                "entity_limit": self.neo4j.entity_limit,
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed to call the API with cookies. `*` = permissive.
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "http://localhost:3000"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
        }
    }
}

// ── Sessions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle lifetime of a login session.
    pub ttl_secs: u64,
}

impl SessionConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            // Two weeks, same as a Django session cookie.
            ttl_secs: profiled_env_u64(p, "SESSION_TTL_SECS", 1_209_600),
        }
    }
}

// ── Neo4j ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// Default server for the `check` command; users register their own.
    pub uri: Option<String>,
    pub username: String,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
    /// Upper bound on nodes/relationships returned by one entity listing.
    pub entity_limit: u64,
}

impl Neo4jConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            uri: profiled_env_opt(p, "NEO4J_URI"),
            username: profiled_env_or(p, "NEO4J_USERNAME", "neo4j"),
            password: profiled_env_opt(p, "NEO4J_PASSWORD"),
            connect_timeout_secs: profiled_env_u64(p, "NEO4J_CONNECT_TIMEOUT_SECS", 10),
            entity_limit: profiled_env_u64(p, "NEO4J_ENTITY_LIMIT", 100),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }
}
