//! In-memory login sessions keyed by the `sessionid` cookie.
//!
//! A session remembers who is logged in and, once a database has been
//! selected, the live connector for it. Connectors are closed whenever they
//! are replaced, deselected, or their session ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

use smartd_connector::GraphConnector;

pub const SESSION_COOKIE: &str = "sessionid";

/// The database a session is currently working against.
#[derive(Clone)]
pub struct SelectedDatabase {
    pub url: String,
    pub connector: Arc<dyn GraphConnector>,
}

struct Session {
    username: String,
    last_seen: Instant,
    selected: Option<SelectedDatabase>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for `username` and return its token.
    pub async fn create(&self, username: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                last_seen: Instant::now(),
                selected: None,
            },
        );
        debug!("Session created for '{}'", username);
        token
    }

    /// Resolve a token to its user, refreshing the idle timer.
    /// An expired session is dropped on sight.
    pub async fn username(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token)?;
        if session.last_seen.elapsed() < self.ttl {
            session.last_seen = Instant::now();
            return Some(session.username.clone());
        }
        let stale = sessions.remove(token);
        drop(sessions);
        if let Some(selected) = stale.and_then(|s| s.selected) {
            selected.connector.close().await;
        }
        None
    }

    /// Attach `connector` to the session, closing whatever it replaces.
    /// Returns false (and closes `connector`) if the session is gone.
    pub async fn select(&self, token: &str, url: &str, connector: Arc<dyn GraphConnector>) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(token) else {
            drop(sessions);
            connector.close().await;
            return false;
        };
        let previous = session.selected.replace(SelectedDatabase {
            url: url.to_string(),
            connector: connector.clone(),
        });
        drop(sessions);

        if let Some(prev) = previous {
            if !Arc::ptr_eq(&prev.connector, &connector) {
                prev.connector.close().await;
            }
        }
        true
    }

    pub async fn selected(&self, token: &str) -> Option<SelectedDatabase> {
        self.sessions.read().await.get(token).and_then(|s| s.selected.clone())
    }

    /// Deselect `url` in every session of `username`. Returns how many
    /// sessions were affected.
    pub async fn clear_selection_for(&self, username: &str, url: &str) -> usize {
        let mut closed = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            for session in sessions.values_mut() {
                if session.username == username
                    && session.selected.as_ref().is_some_and(|s| s.url == url)
                {
                    closed.extend(session.selected.take());
                }
            }
        }
        for selected in &closed {
            selected.connector.close().await;
        }
        closed.len()
    }

    /// End a session. Returns true if it existed.
    pub async fn remove(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        match removed {
            Some(session) => {
                if let Some(selected) = session.selected {
                    selected.connector.close().await;
                }
                debug!("Session ended for '{}'", session.username);
                true
            }
            None => false,
        }
    }

    /// Drop idle sessions and close their connectors.
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let tokens: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.last_seen.elapsed() >= self.ttl)
                .map(|(t, _)| t.clone())
                .collect();
            tokens.iter().filter_map(|t| sessions.remove(t)).collect()
        };
        for session in &expired {
            if let Some(selected) = &session.selected {
                selected.connector.close().await;
            }
        }
        if !expired.is_empty() {
            info!("Purged {} expired sessions", expired.len());
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// End every session, closing all connectors.
    pub async fn close_all(&self) {
        let drained: Vec<Session> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in drained {
            if let Some(selected) = session.selected {
                selected.connector.close().await;
            }
        }
    }
}

/// Extract the session token from the request's `Cookie` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

pub fn clear_cookie() -> String {
    format!("{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE)
}
