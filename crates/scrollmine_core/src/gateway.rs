//! crates/scrollmine_core/src/gateway.rs
//!
//! The dual-mode persistence gateway: every save goes to the hosted backend
//! while a live session exists and to the local library otherwise. Operations
//! on existing items are routed by id, since local ids are always prefixed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::{is_local_id, SavedItem, SavedItemInput, Session};
use crate::library::LocalLibrary;
use crate::ports::{BackendService, ItemPatch, NewRemoteItem, PortError, PortResult};
use crate::session::SessionStore;

/// Generic message for failures that carry no server-provided text.
pub const GENERIC_SAVE_FAILURE: &str = "Failed to save content";

/// Where a save ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveDestination {
    Remote(SavedItem),
    Local(SavedItem),
}

impl SaveDestination {
    pub fn item(&self) -> &SavedItem {
        match self {
            SaveDestination::Remote(item) | SaveDestination::Local(item) => item,
        }
    }

    /// The confirmation toast text for this destination.
    pub fn confirmation(&self) -> &'static str {
        match self {
            SaveDestination::Remote(_) => "Saved to Scrollmine",
            SaveDestination::Local(_) => "Saved to local storage",
        }
    }
}

/// The `{success, error?}` reply of the `saveContent` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn from_result(result: &PortResult<SaveDestination>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(user_message(e)),
            },
        }
    }
}

/// Remote errors carry the server's own message; everything else is generic.
pub fn user_message(error: &PortError) -> String {
    match error {
        PortError::Remote(message) => message.clone(),
        _ => GENERIC_SAVE_FAILURE.to_string(),
    }
}

#[derive(Clone)]
pub struct PersistenceGateway {
    sessions: SessionStore,
    library: LocalLibrary,
    backend: Arc<dyn BackendService>,
}

impl PersistenceGateway {
    pub fn new(
        sessions: SessionStore,
        library: LocalLibrary,
        backend: Arc<dyn BackendService>,
    ) -> Self {
        Self {
            sessions,
            library,
            backend,
        }
    }

    /// Saves `input` remotely when signed in, otherwise at the head of the local list.
    pub async fn save(&self, input: SavedItemInput) -> PortResult<SaveDestination> {
        let result = match self.sessions.get_session().await? {
            Some(session) => {
                debug!("Live session for user {}; saving remotely", session.user.id);
                self.save_remote(&session, input).await
            }
            None => {
                debug!("No live session; saving to the local library");
                self.library
                    .insert_item(input, Utc::now())
                    .await
                    .map(SaveDestination::Local)
            }
        };

        match &result {
            Ok(destination) => info!("Saved item {}", destination.item().id),
            Err(e) => error!("Failed to save content: {}", e),
        }
        result
    }

    async fn save_remote(
        &self,
        session: &Session,
        input: SavedItemInput,
    ) -> PortResult<SaveDestination> {
        let request = NewRemoteItem {
            user_id: session.user.id.clone(),
            url: input.url,
            title: input.title,
            snippet: input.snippet,
            content: input.content,
            tags: input.tags,
            item_type: input.item_type,
            is_favorite: None,
            usage_count: None,
            last_used_at: None,
        };
        self.backend
            .create_item(&session.access_token, &request)
            .await
            .map(SaveDestination::Remote)
    }

    /// Flips the favorite flag of `item` in whichever store holds it.
    pub async fn toggle_favorite(&self, item: &SavedItem) -> PortResult<bool> {
        if is_local_id(&item.id) {
            return self.library.toggle_favorite(&item.id).await;
        }
        let session = self.require_session().await?;
        let favorite = !item.is_favorite;
        let patch = ItemPatch {
            is_favorite: Some(favorite),
            ..Default::default()
        };
        self.backend
            .update_item(&session.access_token, &item.id, &patch)
            .await?;
        Ok(favorite)
    }

    /// Counts one use of every item as generation input.
    ///
    /// Items are updated one by one; a failure on one item is logged and does
    /// not stop the rest. Remote items are skipped when there is no live session.
    pub async fn record_usage(&self, items: &[SavedItem]) -> PortResult<()> {
        let now = Utc::now();
        // Resolved on the first remote item only.
        let mut session: Option<Option<Session>> = None;

        for item in items {
            let outcome = if is_local_id(&item.id) {
                self.library.increment_usage(&item.id, now).await.map(|_| ())
            } else {
                if session.is_none() {
                    session = Some(match self.require_session().await {
                        Ok(session) => Some(session),
                        Err(e) => {
                            warn!("Skipping usage update of remote items: {}", e);
                            None
                        }
                    });
                }
                let Some(live) = session.as_ref().and_then(Option::as_ref) else {
                    continue;
                };
                let patch = ItemPatch {
                    usage_count: Some(item.usage_count + 1),
                    last_used_at: Some(now),
                    ..Default::default()
                };
                self.backend
                    .update_item(&live.access_token, &item.id, &patch)
                    .await
            };

            if let Err(e) = outcome {
                error!("Error updating usage for item {}: {}", item.id, e);
            }
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> PortResult<()> {
        if is_local_id(id) {
            return match self.library.delete_item(id).await? {
                true => Ok(()),
                false => Err(PortError::NotFound(id.to_string())),
            };
        }
        let session = self.require_session().await?;
        self.backend.delete_item(&session.access_token, id).await
    }

    async fn require_session(&self) -> PortResult<Session> {
        self.sessions
            .get_session()
            .await?
            .ok_or(PortError::Unauthorized)
    }

    pub fn library(&self) -> &LocalLibrary {
        &self.library
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}
