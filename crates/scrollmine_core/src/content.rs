//! crates/scrollmine_core/src/content.rs
//!
//! The controller a content script runs in each page. It owns one explicit
//! state object (tracked selection, the bubble and the chat overlay) and is
//! the only thing that mutates it; every DOM event and every incoming message
//! is routed through a method here.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::assistant::AiGateway;
use crate::chat::{ChatMessage, ChatOverlay, PendingReply, QuickAction};
use crate::domain::{ItemType, SavedItemInput};
use crate::extract;
use crate::gateway::{user_message, PersistenceGateway, SaveDestination};
use crate::messaging::{Endpoint, Message, MessageBus, MessageHandler, Response};
use crate::ports::{PageDocument, PortError, PortResult};
use crate::prefs::PreferenceStore;
use crate::widget::{Bubble, MenuAction, MouseButton, SaveGate, ToastSlot, Viewport};

pub const NO_SELECTION: &str = "No text selected";
pub const DRAFT_SAVED: &str = "Draft saved!";

/// How a save triggered from the page ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveAttempt {
    /// Another save was still running; nothing happened.
    Busy,
    NothingSelected,
    Saved(SaveDestination),
    Failed(PortError),
}

struct ContentState {
    selected_text: String,
    bubble: Bubble,
    chat: ChatOverlay,
}

#[derive(Clone)]
pub struct ContentScript {
    document: Arc<dyn PageDocument>,
    bus: MessageBus,
    gateway: PersistenceGateway,
    prefs: PreferenceStore,
    assistant: AiGateway,
    toasts: ToastSlot,
    save_gate: SaveGate,
    state: Arc<Mutex<ContentState>>,
}

impl ContentScript {
    pub fn new(
        document: Arc<dyn PageDocument>,
        bus: MessageBus,
        gateway: PersistenceGateway,
        prefs: PreferenceStore,
        assistant: AiGateway,
        viewport: Viewport,
    ) -> Self {
        Self {
            document,
            bus,
            gateway,
            prefs,
            assistant,
            toasts: ToastSlot::new(),
            save_gate: SaveGate::default(),
            state: Arc::new(Mutex::new(ContentState {
                selected_text: String::new(),
                bubble: Bubble::new(viewport, None),
                chat: ChatOverlay::new(),
            })),
        }
    }

    /// Loads the bubble preferences; the bubble is shown unless disabled.
    pub async fn initialize(&self) -> PortResult<()> {
        let prefs = self.prefs.bubble().await?;
        let mut state = self.state.lock().await;
        let viewport = state.bubble.viewport();
        state.bubble = Bubble::new(viewport, prefs.bubble_position);
        if prefs.bubble_enabled {
            state.bubble.show();
        }
        debug!("Content script initialized; bubble enabled: {}", prefs.bubble_enabled);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Accessors
    //-------------------------------------------------------------------------------------

    pub async fn bubble(&self) -> Bubble {
        self.state.lock().await.bubble.clone()
    }

    pub async fn chat(&self) -> ChatOverlay {
        self.state.lock().await.chat.clone()
    }

    pub async fn selected_text(&self) -> String {
        self.state.lock().await.selected_text.clone()
    }

    pub fn toasts(&self) -> &ToastSlot {
        &self.toasts
    }

    //-------------------------------------------------------------------------------------
    // Selection tracking
    //-------------------------------------------------------------------------------------

    /// Called on mouse-up and key-up; remembers a non-empty selection and
    /// pushes it to the popup if one is open.
    pub async fn selection_changed(&self) {
        let text = extract::selected_text(self.document.as_ref());
        if text.is_empty() {
            return;
        }
        self.state.lock().await.selected_text = text.clone();

        let push = Message::UpdateSelectedText {
            selected_text: text,
        };
        if let Err(e) = self.bus.send(Endpoint::Popup, push).await {
            debug!("Selection not pushed: {}", e);
        }
    }

    //-------------------------------------------------------------------------------------
    // Bubble input
    //-------------------------------------------------------------------------------------

    pub async fn pointer_down(&self, button: MouseButton, x: f64, y: f64) {
        self.state.lock().await.bubble.press(button, x, y);
    }

    pub async fn pointer_move(&self, x: f64, y: f64) {
        self.state.lock().await.bubble.pointer_move(x, y);
    }

    /// Ends a drag; a drag that moved the bubble persists the new position.
    pub async fn pointer_up(&self) -> PortResult<()> {
        let moved_to = self.state.lock().await.bubble.release();
        if let Some(position) = moved_to {
            self.prefs.set_bubble_position(position).await?;
        }
        Ok(())
    }

    pub async fn bubble_click(&self) {
        self.state.lock().await.bubble.click();
    }

    pub async fn bubble_right_click(&self) {
        self.state.lock().await.bubble.right_click();
    }

    pub async fn bubble_double_click(&self) {
        self.open_popup().await;
    }

    /// A click anywhere outside both the bubble and the chat overlay.
    pub async fn outside_click(&self) {
        let mut state = self.state.lock().await;
        state.bubble.outside_click();
        if state.chat.is_open() {
            state.chat.close();
        }
    }

    pub async fn resize(&self, viewport: Viewport) {
        self.state.lock().await.bubble.resize(viewport);
    }

    /// Runs a menu entry. Entries picked while the menu is closed are ignored.
    pub async fn menu_action(&self, action: MenuAction) -> Option<SaveAttempt> {
        let picked = self.state.lock().await.bubble.select(action)?;
        match picked {
            MenuAction::SavePage => Some(self.save_page().await),
            MenuAction::SaveSelection => Some(self.save_selection().await),
            MenuAction::ExpandDraft => {
                self.open_popup().await;
                None
            }
            MenuAction::AskScrollmine => {
                self.open_chat().await;
                None
            }
        }
    }

    async fn open_popup(&self) {
        if let Err(e) = self.bus.send(Endpoint::Background, Message::OpenPopup).await {
            warn!("Could not ask the background to open the popup: {}", e);
        }
    }

    async fn set_bubble_visible(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        if enabled {
            state.bubble.show();
        } else {
            state.bubble.hide();
            state.chat.close();
        }
    }

    //-------------------------------------------------------------------------------------
    // Saving
    //-------------------------------------------------------------------------------------

    pub async fn save_page(&self) -> SaveAttempt {
        let Some(_guard) = self.save_gate.try_begin() else {
            debug!("Already saving, ignoring duplicate call");
            return SaveAttempt::Busy;
        };
        let snapshot = extract::snapshot(self.document.as_ref());
        let input = SavedItemInput {
            url: snapshot.url,
            title: snapshot.title,
            snippet: None,
            content: Some(snapshot.content),
            tags: Vec::new(),
            item_type: snapshot.item_type,
        };
        self.save(input).await
    }

    pub async fn save_selection(&self) -> SaveAttempt {
        let Some(_guard) = self.save_gate.try_begin() else {
            debug!("Already saving, ignoring duplicate call");
            return SaveAttempt::Busy;
        };
        let snapshot = extract::snapshot(self.document.as_ref());
        if snapshot.selected_text.is_empty() {
            self.toasts.error(NO_SELECTION).await;
            return SaveAttempt::NothingSelected;
        }
        let input = SavedItemInput {
            url: snapshot.url,
            title: snapshot.title,
            snippet: Some(snapshot.selected_text),
            content: Some(snapshot.content),
            tags: Vec::new(),
            item_type: snapshot.item_type,
        };
        self.save(input).await
    }

    async fn save(&self, input: SavedItemInput) -> SaveAttempt {
        match self.gateway.save(input).await {
            Ok(destination) => {
                self.toasts.success(destination.confirmation()).await;
                SaveAttempt::Saved(destination)
            }
            Err(e) => {
                self.toasts.error(user_message(&e)).await;
                SaveAttempt::Failed(e)
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Chat overlay
    //-------------------------------------------------------------------------------------

    /// Opens a fresh chat around a new snapshot of the page.
    pub async fn open_chat(&self) {
        let context = extract::snapshot(self.document.as_ref());
        let mut state = self.state.lock().await;
        state.bubble.outside_click();
        state.chat.open(context);
        info!(
            "Chat opened for '{}'",
            state.chat.context().map(|c| c.title.as_str()).unwrap_or_default()
        );
    }

    pub async fn close_chat(&self) {
        self.state.lock().await.chat.close();
    }

    /// Sends a typed chat message. Returns whether a reply was placed.
    pub async fn chat_send(&self, text: &str) -> bool {
        let pending = self.state.lock().await.chat.ask(text);
        match pending {
            Some(pending) => self.answer(pending).await,
            None => false,
        }
    }

    pub async fn chat_quick_action(&self, action: QuickAction) -> bool {
        let pending = self.state.lock().await.chat.run_quick_action(action);
        match pending {
            Some(pending) => self.answer(pending).await,
            None => false,
        }
    }

    /// Asks the assistant without holding the state lock, then resolves the
    /// placeholder if its chat session still exists.
    async fn answer(&self, pending: PendingReply) -> bool {
        let outcome = self
            .assistant
            .complete(&pending.context, &pending.instruction)
            .await;
        let placed = self.state.lock().await.chat.resolve(&pending, outcome);
        if !placed {
            debug!("Discarding a reply for a closed chat");
        }
        placed
    }

    /// Saves an assistant reply as a draft item.
    pub async fn save_reply_as_draft(&self, message_id: u64) -> PortResult<SaveDestination> {
        let (text, context) = {
            let state = self.state.lock().await;
            let reply = state
                .chat
                .message(message_id)
                .filter(|m| m.can_save_as_draft())
                .map(ChatMessage::display_text)
                .ok_or_else(|| PortError::NotFound(format!("chat reply {}", message_id)))?;
            let context = state.chat.context().cloned().unwrap_or_default();
            (reply, context)
        };

        let input = SavedItemInput {
            url: context.url,
            title: context.title,
            snippet: Some(text.clone()),
            content: Some(text),
            tags: vec!["draft".to_string()],
            item_type: ItemType::Draft,
        };
        match self.gateway.save(input).await {
            Ok(destination) => {
                self.toasts.success(DRAFT_SAVED).await;
                Ok(destination)
            }
            Err(e) => {
                self.toasts.error(user_message(&e)).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ContentScript {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::GetSelectedText => Some(Response::SelectedText {
                selected_text: self.selected_text().await,
            }),
            Message::GetPageContent => Some(Response::PageContent {
                page_content: extract::page_content(self.document.as_ref()),
            }),
            Message::ToggleBubble { enabled } => {
                self.set_bubble_visible(enabled).await;
                None
            }
            Message::UpdateSelectedText { .. }
            | Message::Authenticate { .. }
            | Message::Logout
            | Message::GetAuthStatus
            | Message::SaveContent { .. }
            | Message::OpenPopup => {
                debug!("Content script ignores {}", message.action());
                None
            }
        }
    }
}
