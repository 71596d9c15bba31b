//! crates/scrollmine_core/src/session.rs
//!
//! The persisted authentication session. Expired or undecodable sessions are
//! treated exactly like no session and are deleted as soon as they are seen.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::Session;
use crate::ports::{KeyValueStore, PortResult};
use crate::store::{keys, set_typed};

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the live session, removing a stale record instead of returning it.
    pub async fn get_session(&self) -> PortResult<Option<Session>> {
        // Read errors propagate; only a record that fails to decode is dropped.
        let session = match self.store.get(keys::SESSION).await? {
            Some(raw) => match serde_json::from_value::<Session>(raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Discarding unreadable session record: {}", e);
                    self.clear_session().await?;
                    return Ok(None);
                }
            },
            None => None,
        };

        match session {
            Some(session) if session.is_live_at(Utc::now()) => Ok(Some(session)),
            Some(_) => {
                debug!("Stored session expired; removing it");
                self.clear_session().await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn set_session(&self, session: &Session) -> PortResult<()> {
        set_typed(self.store.as_ref(), keys::SESSION, session).await
    }

    pub async fn clear_session(&self) -> PortResult<()> {
        self.store.remove(keys::SESSION).await
    }

    pub async fn is_authenticated(&self) -> PortResult<bool> {
        Ok(self.get_session().await?.is_some())
    }
}
