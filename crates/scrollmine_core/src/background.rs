//! crates/scrollmine_core/src/background.rs
//!
//! The long-lived background context: token bookkeeping for the dashboard,
//! saves requested by other contexts, opening the popup, and the periodic
//! token revalidation task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::gateway::{PersistenceGateway, SaveResponse};
use crate::messaging::{Message, MessageHandler, Response};
use crate::ports::{ExtensionHost, KeyValueStore, PortResult};
use crate::store::keys;

/// How often the stored token is looked at again.
pub const REVALIDATION_PERIOD: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct BackgroundService {
    store: Arc<dyn KeyValueStore>,
    gateway: PersistenceGateway,
    host: Arc<dyn ExtensionHost>,
}

impl BackgroundService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        gateway: PersistenceGateway,
        host: Arc<dyn ExtensionHost>,
    ) -> Self {
        Self {
            store,
            gateway,
            host,
        }
    }

    async fn store_token(&self, token: String) -> PortResult<()> {
        self.store.set(keys::AUTH_TOKEN, Value::String(token)).await
    }

    async fn remove_token(&self) -> PortResult<()> {
        self.store.remove(keys::AUTH_TOKEN).await
    }

    /// The dashboard token when one was handed over, else the live session's.
    async fn auth_status(&self) -> PortResult<Response> {
        let token = match self.store.get(keys::AUTH_TOKEN).await? {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => self
                .gateway
                .sessions()
                .get_session()
                .await?
                .map(|session| session.access_token),
        };
        Ok(Response::AuthStatus {
            authenticated: token.is_some(),
            token,
        })
    }
}

#[async_trait]
impl MessageHandler for BackgroundService {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::Authenticate { token } => {
                match self.store_token(token).await {
                    Ok(()) => info!("User authenticated successfully"),
                    Err(e) => error!("Error storing authentication token: {}", e),
                }
                None
            }
            Message::Logout => {
                match self.remove_token().await {
                    Ok(()) => info!("User logged out successfully"),
                    Err(e) => error!("Error removing authentication token: {}", e),
                }
                None
            }
            Message::GetAuthStatus => Some(self.auth_status().await.unwrap_or_else(|e| {
                error!("Error getting auth status: {}", e);
                Response::AuthStatus {
                    authenticated: false,
                    token: None,
                }
            })),
            Message::SaveContent { data } => {
                let result = self.gateway.save(data).await;
                Some(Response::Save(SaveResponse::from_result(&result)))
            }
            Message::OpenPopup => {
                if let Err(e) = self.host.open_popup() {
                    error!("Could not open the popup: {}", e);
                }
                None
            }
            Message::GetSelectedText
            | Message::GetPageContent
            | Message::ToggleBubble { .. }
            | Message::UpdateSelectedText { .. } => {
                debug!("Background ignores {}", message.action());
                None
            }
        }
    }
}

/// Re-reads the stored token every `period` until `cancel` fires.
///
/// No corrective action is taken; returns how many checks ran.
pub async fn token_revalidation(
    store: Arc<dyn KeyValueStore>,
    period: Duration,
    cancel: CancellationToken,
) -> usize {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let mut checks = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Token revalidation stopped after {} check(s)", checks);
                return checks;
            }
            _ = ticker.tick() => {
                checks += 1;
                match store.get(keys::AUTH_TOKEN).await {
                    Ok(Some(_)) => debug!("Stored token still present"),
                    Ok(None) => debug!("No stored token to revalidate"),
                    Err(e) => error!("Error validating token: {}", e),
                }
            }
        }
    }
}
