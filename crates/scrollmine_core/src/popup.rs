//! crates/scrollmine_core/src/popup.rs
//!
//! The popup controller: the save form for the active tab, sign-in and
//! sign-out, the bubble toggle, and the dashboard link.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::account::{AccountService, SignInOutcome};
use crate::domain::{SavedItemInput, Session};
use crate::extract::content_type_for_url;
use crate::gateway::{user_message, PersistenceGateway, SaveDestination};
use crate::messaging::{Endpoint, Message, MessageBus, MessageHandler, Response};
use crate::ports::{PortError, PortResult};
use crate::prefs::PreferenceStore;
use crate::widget::SaveGate;

/// How long the popup waits for the account service before going on without it.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where "open dashboard" leads, per storage mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLinks {
    pub remote: String,
    pub local: String,
}

impl Default for DashboardLinks {
    fn default() -> Self {
        Self {
            remote: "http://localhost:3000/dashboard".to_string(),
            local: "http://localhost:3000/local-dashboard".to_string(),
        }
    }
}

/// The browser tab the popup was opened over.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTab {
    pub endpoint: Endpoint,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub message: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(message: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Splits a comma-separated tag field, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe(error: &PortError) -> String {
    match error {
        PortError::Invalid(message) => message.clone(),
        other => user_message(other),
    }
}

#[derive(Default)]
struct PopupState {
    tab: Option<ActiveTab>,
    snippet: String,
    tags: String,
    page_content: String,
    session: Option<Session>,
    bubble_enabled: bool,
    status: Option<Status>,
}

#[derive(Clone)]
pub struct PopupController {
    bus: MessageBus,
    gateway: PersistenceGateway,
    account: AccountService,
    prefs: PreferenceStore,
    links: DashboardLinks,
    submit_gate: SaveGate,
    state: Arc<Mutex<PopupState>>,
}

impl PopupController {
    pub fn new(
        bus: MessageBus,
        gateway: PersistenceGateway,
        account: AccountService,
        prefs: PreferenceStore,
        links: DashboardLinks,
    ) -> Self {
        Self {
            bus,
            gateway,
            account,
            prefs,
            links,
            submit_gate: SaveGate::default(),
            state: Arc::new(Mutex::new(PopupState::default())),
        }
    }

    /// Prepares the popup for `tab`: waits for the account service, pulls the
    /// selection and page text from the tab, then loads session and settings.
    pub async fn open(&self, tab: Option<ActiveTab>) {
        if !self.account.readiness().wait(READY_TIMEOUT).await {
            warn!("Account service not ready after {:?}, continuing", READY_TIMEOUT);
        }

        let (selection, content) = match &tab {
            Some(tab) => tokio::join!(
                self.bus.send(tab.endpoint, Message::GetSelectedText),
                self.bus.send(tab.endpoint, Message::GetPageContent)
            ),
            None => (Ok(None), Ok(None)),
        };

        let session = self.account.current_session().await.unwrap_or_else(|e| {
            error!("Error checking auth: {}", e);
            None
        });
        let bubble_enabled = match self.prefs.bubble().await {
            Ok(prefs) => prefs.bubble_enabled,
            Err(e) => {
                error!("Error initializing settings: {}", e);
                true
            }
        };

        let mut state = self.state.lock().await;
        match selection {
            Ok(Some(Response::SelectedText { selected_text })) if !selected_text.is_empty() => {
                state.snippet = selected_text;
            }
            Ok(_) => {}
            Err(e) => debug!("Content script not available: {}", e),
        }
        if let Ok(Some(Response::PageContent { page_content })) = content {
            state.page_content = page_content;
        }
        state.status = Some(match &session {
            Some(_) => Status::new("Ready to save content", StatusKind::Success),
            None => Status::new("Local mode - content saved to browser", StatusKind::Info),
        });
        state.tab = tab;
        state.session = session;
        state.bubble_enabled = bubble_enabled;
    }

    //-------------------------------------------------------------------------------------
    // Form
    //-------------------------------------------------------------------------------------

    pub async fn set_snippet(&self, snippet: impl Into<String>) {
        self.state.lock().await.snippet = snippet.into();
    }

    pub async fn set_tags(&self, tags: impl Into<String>) {
        self.state.lock().await.tags = tags.into();
    }

    pub async fn snippet(&self) -> String {
        self.state.lock().await.snippet.clone()
    }

    pub async fn tags(&self) -> String {
        self.state.lock().await.tags.clone()
    }

    pub async fn status(&self) -> Option<Status> {
        self.state.lock().await.status.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.session.clone()
    }

    pub async fn is_local_mode(&self) -> bool {
        self.state.lock().await.session.is_none()
    }

    pub async fn dashboard_url(&self) -> String {
        if self.is_local_mode().await {
            self.links.local.clone()
        } else {
            self.links.remote.clone()
        }
    }

    async fn set_status(&self, message: impl Into<String>, kind: StatusKind) {
        self.state.lock().await.status = Some(Status::new(message, kind));
    }

    /// Saves the form for the active tab.
    pub async fn submit(&self) -> PortResult<SaveDestination> {
        let Some(_guard) = self.submit_gate.try_begin() else {
            return Err(PortError::Invalid("A save is already in progress".to_string()));
        };

        let input = {
            let state = self.state.lock().await;
            let tab = state
                .tab
                .as_ref()
                .ok_or_else(|| PortError::Invalid("No active tab found".to_string()))?;
            let snippet = state.snippet.trim();
            SavedItemInput {
                url: tab.url.clone(),
                title: tab.title.trim().to_string(),
                snippet: (!snippet.is_empty()).then(|| snippet.to_string()),
                content: (!state.page_content.is_empty()).then(|| state.page_content.clone()),
                tags: parse_tags(&state.tags),
                item_type: content_type_for_url(&tab.url),
            }
        };

        let result = if input.title.is_empty() {
            Err(PortError::Invalid("Page title is required".to_string()))
        } else {
            self.gateway.save(input).await
        };

        let mut state = self.state.lock().await;
        match &result {
            Ok(destination) => {
                let message = match destination {
                    SaveDestination::Remote(_) => "Content saved successfully!",
                    SaveDestination::Local(_) => "Content saved locally!",
                };
                state.status = Some(Status::new(message, StatusKind::Success));
                state.snippet.clear();
                state.tags.clear();
            }
            Err(PortError::Unauthorized) => {
                state.session = None;
                state.status = Some(Status::new(
                    "Session expired. Please sign in again.",
                    StatusKind::Error,
                ));
            }
            Err(e) => {
                error!("Error saving content: {}", e);
                state.status = Some(Status::new(format!("Error: {}", describe(e)), StatusKind::Error));
            }
        }
        result
    }

    //-------------------------------------------------------------------------------------
    // Account
    //-------------------------------------------------------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> PortResult<SignInOutcome> {
        match self.account.sign_in(email, password).await {
            Ok(outcome) => {
                let mut state = self.state.lock().await;
                state.session = Some(outcome.session.clone());
                state.status = Some(Status::new("Successfully signed in!", StatusKind::Success));
                Ok(outcome)
            }
            Err(PortError::Invalid(message)) => {
                self.set_status(message.clone(), StatusKind::Error).await;
                Err(PortError::Invalid(message))
            }
            Err(e) => {
                error!("Login error: {}", e);
                self.set_status(format!("Login failed: {}", e), StatusKind::Error)
                    .await;
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) -> PortResult<()> {
        match self.account.sign_out().await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.session = None;
                state.status = Some(Status::new("Successfully signed out", StatusKind::Success));
                Ok(())
            }
            Err(e) => {
                error!("Logout error: {}", e);
                self.set_status("Error signing out", StatusKind::Error).await;
                Err(e)
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Settings
    //-------------------------------------------------------------------------------------

    pub async fn bubble_enabled(&self) -> bool {
        self.state.lock().await.bubble_enabled
    }

    /// Persists the bubble setting and tells every tab to follow it.
    pub async fn set_bubble_enabled(&self, enabled: bool) -> PortResult<()> {
        if let Err(e) = self.prefs.set_bubble_enabled(enabled).await {
            error!("Error toggling bubble: {}", e);
            self.set_status("Error updating bubble settings", StatusKind::Error)
                .await;
            return Err(e);
        }
        self.bus
            .broadcast_to_tabs(Message::ToggleBubble { enabled })
            .await;

        let mut state = self.state.lock().await;
        state.bubble_enabled = enabled;
        let message = if enabled {
            "Floating bubble enabled"
        } else {
            "Floating bubble disabled"
        };
        state.status = Some(Status::new(message, StatusKind::Success));
        info!("{}", message);
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for PopupController {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::UpdateSelectedText { selected_text } => {
                self.state.lock().await.snippet = selected_text;
            }
            other => debug!("Popup ignores {}", other.action()),
        }
        None
    }
}
