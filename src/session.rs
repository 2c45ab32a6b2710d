use crate::storage::LocalStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

pub const SESSION_KEY: &str = "chat_session_id";
/// Used when no persistent storage is reachable; such calls are not tied to a user.
pub const PLACEHOLDER_SESSION: &str = "ssr-session";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_SESSION.into())
    }

    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("session_{}_{}", Utc::now().timestamp_millis(), &suffix[..7]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_SESSION
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the persisted session id, creating and storing one on first use.
///
/// Never fails: a missing or broken store yields the placeholder id.
pub async fn resolve_session_id(store: Option<&dyn LocalStore>) -> SessionId {
    let Some(store) = store else {
        debug!("no local store, using placeholder session");
        return SessionId::placeholder();
    };
    match store.get(SESSION_KEY).await {
        Ok(Some(existing)) if !existing.trim().is_empty() => SessionId::new(existing),
        Ok(_) => {
            let fresh = SessionId::generate();
            match store.set(SESSION_KEY, fresh.as_str()).await {
                Ok(()) => {
                    debug!(session = %fresh, "created session id");
                    fresh
                }
                Err(e) => {
                    warn!(error = %e, "could not persist session id");
                    SessionId::placeholder()
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "could not read session id");
            SessionId::placeholder()
        }
    }
}
