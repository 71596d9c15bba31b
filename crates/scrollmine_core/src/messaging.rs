//! crates/scrollmine_core/src/messaging.rs
//!
//! Cross-context messaging between the content scripts, the background
//! context and the popup.
//!
//! Every context registers exactly one [`MessageHandler`] on the [`MessageBus`].
//! The bus runs one task per registered context; that task starts handling
//! messages in arrival order and drives the in-flight handlers cooperatively,
//! so a handler that is waiting on storage or the network does not block the
//! next message. Each request carries a one-shot reply slot that is consumed
//! exactly once, whether or not the handler produced a response.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

use crate::domain::SavedItemInput;
use crate::gateway::SaveResponse;

//=========================================================================================
// Wire Types
//=========================================================================================

/// Every request a context can send, tagged by its `action` name on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    GetSelectedText,
    GetPageContent,
    ToggleBubble {
        enabled: bool,
    },
    /// Pushed by a content script whenever the page selection changes.
    UpdateSelectedText {
        #[serde(rename = "selectedText")]
        selected_text: String,
    },
    Authenticate {
        token: String,
    },
    Logout,
    GetAuthStatus,
    SaveContent {
        data: SavedItemInput,
    },
    OpenPopup,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::GetSelectedText => "getSelectedText",
            Message::GetPageContent => "getPageContent",
            Message::ToggleBubble { .. } => "toggleBubble",
            Message::UpdateSelectedText { .. } => "updateSelectedText",
            Message::Authenticate { .. } => "authenticate",
            Message::Logout => "logout",
            Message::GetAuthStatus => "getAuthStatus",
            Message::SaveContent { .. } => "saveContent",
            Message::OpenPopup => "openPopup",
        }
    }
}

/// Replies, serialized without a tag exactly as the counterpart contexts expect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    SelectedText {
        #[serde(rename = "selectedText")]
        selected_text: String,
    },
    PageContent {
        #[serde(rename = "pageContent")]
        page_content: String,
    },
    AuthStatus {
        authenticated: bool,
        token: Option<String>,
    },
    Save(SaveResponse),
}

//=========================================================================================
// Endpoints and Errors
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Background,
    Popup,
    /// The content script injected into the browser tab with this id.
    Tab(u32),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Background => write!(f, "background"),
            Endpoint::Popup => write!(f, "popup"),
            Endpoint::Tab(id) => write!(f, "tab {}", id),
        }
    }
}

/// The receiving context could not be reached.
///
/// Callers treat this as "feature unavailable" and carry on without the reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Could not establish connection: no receiver registered for {0}")]
    NoReceiver(Endpoint),
    #[error("The {0} context closed before responding")]
    Closed(Endpoint),
}

//=========================================================================================
// Handler Contract
//=========================================================================================

/// The single message handler a context registers.
///
/// Returning `None` means the message is fire-and-forget; the sender then
/// receives `Ok(None)`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Option<Response>;
}

struct Envelope {
    message: Message,
    reply: oneshot::Sender<Option<Response>>,
}

//=========================================================================================
// Message Bus
//=========================================================================================

#[derive(Clone, Default)]
pub struct MessageBus {
    endpoints: Arc<RwLock<HashMap<Endpoint, mpsc::UnboundedSender<Envelope>>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as the receiver for `endpoint`, replacing any
    /// previous registration, and spawns the context's task.
    pub async fn register(&self, endpoint: Endpoint, handler: Arc<dyn MessageHandler>) {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_context(endpoint, handler, rx));
        if self.endpoints.write().await.insert(endpoint, tx).is_some() {
            debug!("Replaced the message handler for {}", endpoint);
        }
    }

    /// Drops the registration; messages already delivered are still answered.
    pub async fn unregister(&self, endpoint: Endpoint) {
        self.endpoints.write().await.remove(&endpoint);
    }

    pub async fn is_registered(&self, endpoint: Endpoint) -> bool {
        self.endpoints.read().await.contains_key(&endpoint)
    }

    pub async fn send(
        &self,
        endpoint: Endpoint,
        message: Message,
    ) -> Result<Option<Response>, DeliveryError> {
        let sender = self
            .endpoints
            .read()
            .await
            .get(&endpoint)
            .cloned()
            .ok_or(DeliveryError::NoReceiver(endpoint))?;

        debug!("Sending {} to {}", message.action(), endpoint);
        let (reply, response) = oneshot::channel();
        sender
            .send(Envelope { message, reply })
            .map_err(|_| DeliveryError::Closed(endpoint))?;
        response.await.map_err(|_| DeliveryError::Closed(endpoint))
    }

    /// Sends `message` to every registered tab; unreachable tabs are skipped.
    pub async fn broadcast_to_tabs(&self, message: Message) {
        let mut tabs: Vec<Endpoint> = self
            .endpoints
            .read()
            .await
            .keys()
            .copied()
            .filter(|endpoint| matches!(endpoint, Endpoint::Tab(_)))
            .collect();
        tabs.sort_by_key(|endpoint| match endpoint {
            Endpoint::Tab(id) => *id,
            _ => 0,
        });

        for tab in tabs {
            if let Err(e) = self.send(tab, message.clone()).await {
                debug!("Skipping {} during broadcast: {}", tab, e);
            }
        }
    }
}

/// The per-context task: accepts envelopes in order and drives their handlers.
async fn run_context(
    endpoint: Endpoint,
    handler: Arc<dyn MessageHandler>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
) {
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            envelope = inbox.recv() => match envelope {
                Some(Envelope { message, reply }) => {
                    let handler = handler.clone();
                    in_flight.push(async move {
                        let response = handler.handle(message).await;
                        if reply.send(response).is_err() {
                            warn!("Sender dropped before the reply for {} was ready", endpoint);
                        }
                    });
                }
                None => break,
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
        }
    }

    while in_flight.next().await.is_some() {}
    debug!("Message task for {} finished", endpoint);
}
