//! crates/scrollmine_core/src/chat.rs
//!
//! The "Ask Scrollmine" chat overlay: transcript, quick actions and the
//! placeholder that stands in for a reply until the generator answers.
//!
//! Every open builds a fresh session with a new generation number. A pending
//! reply remembers the generation it was issued under, so a reply that lands
//! after the overlay was closed (or closed and reopened) is dropped.

use crate::domain::{BubblePosition, PageSnapshot};
use crate::ports::PortError;
use crate::widget::{Viewport, BUBBLE_SIZE};

pub const GREETING: &str =
    "Hi! I've captured this page context. What would you like me to help you with?";
pub const THINKING: &str = "Thinking...";

pub const OVERLAY_WIDTH: f64 = 320.0;
pub const OVERLAY_HEIGHT: f64 = 400.0;
pub const OVERLAY_MARGIN: f64 = 10.0;

//=========================================================================================
// Quick Actions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Summarize,
    ExpandDraft,
    Explain,
    Relate,
    /// Only offered on social platforms.
    SuggestComment,
}

impl QuickAction {
    pub fn label(&self) -> &'static str {
        match self {
            QuickAction::Summarize => "Summarize",
            QuickAction::ExpandDraft => "Expand Draft",
            QuickAction::Explain => "Explain",
            QuickAction::Relate => "Relate",
            QuickAction::SuggestComment => "Suggest Reply",
        }
    }

    /// The canned request for this action, filled in from the captured page.
    pub fn prompt(&self, context: &PageSnapshot) -> String {
        let title = &context.title;
        match self {
            QuickAction::Summarize => {
                format!("Summarize this page content in 2-3 key points: {}", title)
            }
            QuickAction::ExpandDraft => format!(
                "Create a social media draft post based on this content: {}",
                title
            ),
            QuickAction::Explain => format!(
                "Explain this content in simple terms that anyone can understand: {}",
                title
            ),
            QuickAction::Relate => format!(
                "How does this content relate to current trends or similar topics? {}",
                title
            ),
            QuickAction::SuggestComment => format!(
                "Suggest 2-3 smart replies or comments for this {} post: {}",
                context.platform.map(|p| p.as_str()).unwrap_or("social"),
                title
            ),
        }
    }

    /// The actions offered for `context`, in display order.
    pub fn available(context: &PageSnapshot) -> Vec<QuickAction> {
        let mut actions = Vec::with_capacity(5);
        if context.platform.is_some() {
            actions.push(QuickAction::SuggestComment);
        }
        actions.extend([
            QuickAction::Summarize,
            QuickAction::ExpandDraft,
            QuickAction::Explain,
            QuickAction::Relate,
        ]);
        actions
    }
}

//=========================================================================================
// Transcript
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatBody {
    Text(String),
    Thinking,
    /// A generated answer; these carry the "Save as Draft" affordance.
    Reply(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub body: ChatBody,
}

impl ChatMessage {
    pub fn display_text(&self) -> String {
        match &self.body {
            ChatBody::Text(text) | ChatBody::Reply(text) => text.clone(),
            ChatBody::Thinking => THINKING.to_string(),
            ChatBody::Failed(error) => {
                format!("Sorry, I couldn't process that request: {}", error)
            }
        }
    }

    pub fn can_save_as_draft(&self) -> bool {
        matches!(self.body, ChatBody::Reply(_))
    }
}

/// A request the controller must send to the AI gateway and then resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    pub generation: u64,
    pub placeholder_id: u64,
    pub instruction: String,
    pub context: PageSnapshot,
}

#[derive(Debug, Clone)]
struct ChatSession {
    context: PageSnapshot,
    messages: Vec<ChatMessage>,
    quick_actions_visible: bool,
    next_id: u64,
}

impl ChatSession {
    fn push(&mut self, role: ChatRole, body: ChatBody) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage { id, role, body });
        id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatOverlay {
    generation: u64,
    session: Option<ChatSession>,
}

impl ChatOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh session around `context`, discarding any previous one.
    pub fn open(&mut self, context: PageSnapshot) {
        self.generation += 1;
        let mut session = ChatSession {
            context,
            messages: Vec::new(),
            quick_actions_visible: true,
            next_id: 0,
        };
        session.push(ChatRole::Assistant, ChatBody::Text(GREETING.to_string()));
        self.session = Some(session);
    }

    pub fn close(&mut self) {
        self.session = None;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn context(&self) -> Option<&PageSnapshot> {
        self.session.as_ref().map(|s| &s.context)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.session
            .as_ref()
            .map(|s| s.messages.as_slice())
            .unwrap_or_default()
    }

    pub fn message(&self, id: u64) -> Option<&ChatMessage> {
        self.messages().iter().find(|m| m.id == id)
    }

    /// Quick actions still on screen; empty once the conversation started.
    pub fn quick_actions(&self) -> Vec<QuickAction> {
        match &self.session {
            Some(session) if session.quick_actions_visible => {
                QuickAction::available(&session.context)
            }
            _ => Vec::new(),
        }
    }

    /// Appends a free-text user message and its placeholder.
    ///
    /// Blank input and a closed overlay produce nothing.
    pub fn ask(&mut self, text: &str) -> Option<PendingReply> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.submit(text.to_string())
    }

    pub fn run_quick_action(&mut self, action: QuickAction) -> Option<PendingReply> {
        let prompt = action.prompt(self.context()?);
        self.submit(prompt)
    }

    fn submit(&mut self, instruction: String) -> Option<PendingReply> {
        let generation = self.generation;
        let session = self.session.as_mut()?;
        session.quick_actions_visible = false;
        session.push(ChatRole::User, ChatBody::Text(instruction.clone()));
        let placeholder_id = session.push(ChatRole::Assistant, ChatBody::Thinking);
        Some(PendingReply {
            generation,
            placeholder_id,
            instruction,
            context: session.context.clone(),
        })
    }

    /// Replaces the placeholder of `pending` with the outcome.
    ///
    /// Returns `false` when the reply belongs to a session that no longer exists.
    pub fn resolve(&mut self, pending: &PendingReply, outcome: Result<String, PortError>) -> bool {
        if pending.generation != self.generation {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(message) = session
            .messages
            .iter_mut()
            .find(|m| m.id == pending.placeholder_id)
        else {
            return false;
        };
        message.body = match outcome {
            Ok(text) => ChatBody::Reply(text),
            Err(e) => ChatBody::Failed(e.to_string()),
        };
        true
    }
}

//=========================================================================================
// Placement
//=========================================================================================

/// Top-left corner of the overlay: centered above the bubble, kept 10 px from
/// the viewport sides, and dropped below the bubble when there is no room above.
pub fn overlay_origin(bubble: BubblePosition, viewport: Viewport) -> BubblePosition {
    let mut left = bubble.x + BUBBLE_SIZE / 2.0 - OVERLAY_WIDTH / 2.0;
    let mut top = bubble.y - OVERLAY_HEIGHT - OVERLAY_MARGIN;

    if left < OVERLAY_MARGIN {
        left = OVERLAY_MARGIN;
    }
    if left + OVERLAY_WIDTH > viewport.width - OVERLAY_MARGIN {
        left = viewport.width - OVERLAY_WIDTH - OVERLAY_MARGIN;
    }
    if top < OVERLAY_MARGIN {
        top = bubble.y + BUBBLE_SIZE + OVERLAY_MARGIN;
    }
    BubblePosition { x: left, y: top }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SocialPlatform;

    fn context(platform: Option<SocialPlatform>) -> PageSnapshot {
        PageSnapshot {
            title: "Rust 2024".into(),
            url: "https://blog.example.com/rust".into(),
            platform,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_starts_with_greeting_and_actions() {
        let mut overlay = ChatOverlay::new();
        overlay.open(context(None));

        assert_eq!(overlay.messages().len(), 1);
        assert_eq!(overlay.messages()[0].display_text(), GREETING);
        assert_eq!(
            overlay.quick_actions(),
            vec![
                QuickAction::Summarize,
                QuickAction::ExpandDraft,
                QuickAction::Explain,
                QuickAction::Relate
            ]
        );
    }

    #[test]
    fn test_social_platform_offers_reply_suggestions() {
        let mut overlay = ChatOverlay::new();
        overlay.open(context(Some(SocialPlatform::Linkedin)));
        assert_eq!(overlay.quick_actions()[0], QuickAction::SuggestComment);

        let pending = overlay
            .run_quick_action(QuickAction::SuggestComment)
            .unwrap();
        assert_eq!(
            pending.instruction,
            "Suggest 2-3 smart replies or comments for this linkedin post: Rust 2024"
        );
        assert!(overlay.quick_actions().is_empty());
    }

    #[test]
    fn test_placeholder_is_replaced_in_place() {
        let mut overlay = ChatOverlay::new();
        overlay.open(context(None));

        let pending = overlay.ask("  what is this?  ").unwrap();
        assert_eq!(pending.instruction, "what is this?");
        assert_eq!(
            overlay.message(pending.placeholder_id).unwrap().display_text(),
            THINKING
        );

        assert!(overlay.resolve(&pending, Ok("An article about Rust.".into())));
        let reply = overlay.message(pending.placeholder_id).unwrap();
        assert_eq!(reply.display_text(), "An article about Rust.");
        assert!(reply.can_save_as_draft());
        assert_eq!(overlay.messages().len(), 3);
    }

    #[test]
    fn test_failure_replaces_placeholder_with_error() {
        let mut overlay = ChatOverlay::new();
        overlay.open(context(None));
        let pending = overlay.run_quick_action(QuickAction::Summarize).unwrap();

        overlay.resolve(&pending, Err(PortError::Remote("quota exceeded".into())));

        let message = overlay.message(pending.placeholder_id).unwrap();
        assert_eq!(
            message.display_text(),
            "Sorry, I couldn't process that request: quota exceeded"
        );
        assert!(!message.can_save_as_draft());
    }

    #[test]
    fn test_reply_after_reopen_is_discarded() {
        let mut overlay = ChatOverlay::new();
        overlay.open(context(None));
        let stale = overlay.ask("first").unwrap();

        overlay.close();
        assert!(!overlay.resolve(&stale, Ok("late".into())));

        overlay.open(context(None));
        assert!(!overlay.resolve(&stale, Ok("late".into())));
        assert_eq!(overlay.messages().len(), 1);
        assert_eq!(overlay.quick_actions().len(), 4);
    }

    #[test]
    fn test_blank_or_closed_input_is_ignored() {
        let mut overlay = ChatOverlay::new();
        assert!(overlay.ask("hello").is_none());

        overlay.open(context(None));
        assert!(overlay.ask("   ").is_none());
        assert_eq!(overlay.quick_actions().len(), 4);
    }

    #[test]
    fn test_overlay_sits_above_bubble() {
        let viewport = Viewport::new(1024.0, 768.0);
        let origin = overlay_origin(BubblePosition { x: 500.0, y: 600.0 }, viewport);
        assert_eq!(origin, BubblePosition { x: 360.0, y: 190.0 });
    }

    #[test]
    fn test_overlay_is_kept_inside_viewport() {
        let viewport = Viewport::new(1024.0, 768.0);

        let right = overlay_origin(BubblePosition { x: 984.0, y: 700.0 }, viewport);
        assert_eq!(right.x, 1024.0 - 320.0 - 10.0);

        let left = overlay_origin(BubblePosition { x: 0.0, y: 700.0 }, viewport);
        assert_eq!(left.x, 10.0);

        let top = overlay_origin(BubblePosition { x: 500.0, y: 20.0 }, viewport);
        assert_eq!(top.y, 70.0);
    }
}
