//! crates/scrollmine_core/src/widget.rs
//!
//! The floating in-page bubble: its state machine, drag clamping, menu,
//! transient toasts and the save re-entrancy guard.
//!
//! Nothing here touches the page; the content controller feeds pointer events
//! in and renders whatever state comes out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::domain::BubblePosition;

/// Edge length of the bubble in pixels.
pub const BUBBLE_SIZE: f64 = 40.0;
/// Distance of the default position from the bottom-right corner.
pub const DEFAULT_CORNER_OFFSET: f64 = 60.0;

pub const TOAST_VISIBLE: Duration = Duration::from_millis(2000);
pub const TOAST_FADE: Duration = Duration::from_millis(300);

//=========================================================================================
// Geometry
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn default_position(&self) -> BubblePosition {
        BubblePosition {
            x: self.width - DEFAULT_CORNER_OFFSET,
            y: self.height - DEFAULT_CORNER_OFFSET,
        }
    }

    /// Keeps the whole bubble on screen: `0 <= x <= width - 40`, same for y.
    pub fn clamp(&self, x: f64, y: f64) -> BubblePosition {
        let max_x = (self.width - BUBBLE_SIZE).max(0.0);
        let max_y = (self.height - BUBBLE_SIZE).max(0.0);
        BubblePosition {
            x: x.clamp(0.0, max_x),
            y: y.clamp(0.0, max_y),
        }
    }
}

//=========================================================================================
// Bubble State Machine
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SavePage,
    SaveSelection,
    /// Opens the extension popup.
    ExpandDraft,
    /// Opens the chat overlay.
    AskScrollmine,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        MenuAction::SavePage,
        MenuAction::SaveSelection,
        MenuAction::ExpandDraft,
        MenuAction::AskScrollmine,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::SavePage => "Save Page",
            MenuAction::SaveSelection => "Save Selection",
            MenuAction::ExpandDraft => "Expand into Draft",
            MenuAction::AskScrollmine => "Ask Scrollmine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BubbleState {
    Hidden,
    Idle,
    MenuOpen,
    Dragging {
        /// Pointer offset from the bubble's top-left corner at press time.
        offset_x: f64,
        offset_y: f64,
        moved: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Bubble {
    state: BubbleState,
    position: BubblePosition,
    viewport: Viewport,
    suppress_next_click: bool,
}

impl Bubble {
    /// A hidden bubble at `saved` or, when nothing was saved, the default corner.
    /// A saved position is pulled back inside `viewport`.
    pub fn new(viewport: Viewport, saved: Option<BubblePosition>) -> Self {
        let position = saved.map_or_else(
            || viewport.default_position(),
            |p| viewport.clamp(p.x, p.y),
        );
        Self {
            state: BubbleState::Hidden,
            position,
            viewport,
            suppress_next_click: false,
        }
    }

    pub fn state(&self) -> BubbleState {
        self.state
    }

    pub fn position(&self) -> BubblePosition {
        self.position
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_visible(&self) -> bool {
        self.state != BubbleState::Hidden
    }

    pub fn is_menu_open(&self) -> bool {
        self.state == BubbleState::MenuOpen
    }

    pub fn show(&mut self) {
        if self.state == BubbleState::Hidden {
            self.state = BubbleState::Idle;
        }
    }

    pub fn hide(&mut self) {
        self.state = BubbleState::Hidden;
        self.suppress_next_click = false;
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.position = viewport.clamp(self.position.x, self.position.y);
    }

    /// Pointer pressed on the bubble. Only the left button starts a drag.
    pub fn press(&mut self, button: MouseButton, pointer_x: f64, pointer_y: f64) {
        if button != MouseButton::Left || self.state != BubbleState::Idle {
            return;
        }
        self.state = BubbleState::Dragging {
            offset_x: pointer_x - self.position.x,
            offset_y: pointer_y - self.position.y,
            moved: false,
        };
    }

    /// Pointer moved anywhere on the page.
    pub fn pointer_move(&mut self, pointer_x: f64, pointer_y: f64) {
        if let BubbleState::Dragging {
            offset_x,
            offset_y,
            moved,
        } = self.state
        {
            let next = self
                .viewport
                .clamp(pointer_x - offset_x, pointer_y - offset_y);
            let changed = next != self.position;
            self.position = next;
            self.state = BubbleState::Dragging {
                offset_x,
                offset_y,
                moved: moved || changed,
            };
        }
    }

    /// Pointer released. Returns the position to persist when the drag moved the bubble.
    pub fn release(&mut self) -> Option<BubblePosition> {
        match self.state {
            BubbleState::Dragging { moved, .. } => {
                self.state = BubbleState::Idle;
                self.suppress_next_click = moved;
                moved.then_some(self.position)
            }
            _ => None,
        }
    }

    /// Single click on the bubble toggles the menu, unless it ends a drag.
    pub fn click(&mut self) {
        if std::mem::take(&mut self.suppress_next_click) {
            return;
        }
        self.toggle_menu();
    }

    pub fn right_click(&mut self) {
        self.suppress_next_click = false;
        self.toggle_menu();
    }

    /// Any click outside the bubble closes the menu.
    pub fn outside_click(&mut self) {
        if self.state == BubbleState::MenuOpen {
            self.state = BubbleState::Idle;
        }
    }

    /// Picks a menu entry; the menu closes first.
    pub fn select(&mut self, action: MenuAction) -> Option<MenuAction> {
        if self.state != BubbleState::MenuOpen {
            return None;
        }
        self.state = BubbleState::Idle;
        Some(action)
    }

    fn toggle_menu(&mut self) {
        self.state = match self.state {
            BubbleState::Idle => BubbleState::MenuOpen,
            BubbleState::MenuOpen => BubbleState::Idle,
            other => other,
        };
    }
}

//=========================================================================================
// Toasts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    Visible,
    Fading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub phase: ToastPhase,
}

#[derive(Default)]
struct ToastState {
    generation: u64,
    current: Option<Toast>,
}

/// Holds at most one toast; showing a new one replaces the previous one.
#[derive(Clone, Default)]
pub struct ToastSlot {
    inner: Arc<Mutex<ToastState>>,
}

impl ToastSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn show(&self, message: impl Into<String>, kind: ToastKind) {
        let generation = {
            let mut state = self.inner.lock().await;
            state.generation += 1;
            state.current = Some(Toast {
                message: message.into(),
                kind,
                phase: ToastPhase::Visible,
            });
            state.generation
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TOAST_VISIBLE).await;
            {
                let mut state = inner.lock().await;
                if state.generation != generation {
                    return;
                }
                if let Some(toast) = state.current.as_mut() {
                    toast.phase = ToastPhase::Fading;
                }
            }
            tokio::time::sleep(TOAST_FADE).await;
            let mut state = inner.lock().await;
            if state.generation == generation {
                state.current = None;
            }
        });
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Success).await
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Error).await
    }

    pub async fn current(&self) -> Option<Toast> {
        self.inner.lock().await.current.clone()
    }
}

//=========================================================================================
// Save Re-entrancy Guard
//=========================================================================================

/// Lets at most one save run at a time.
#[derive(Clone, Default)]
pub struct SaveGate {
    busy: Arc<AtomicBool>,
}

impl SaveGate {
    /// Claims the gate, or `None` while another save holds it.
    pub fn try_begin(&self) -> Option<SavingGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SavingGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_saving(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, including on early return or panic.
pub struct SavingGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
