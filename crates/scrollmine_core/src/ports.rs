//! crates/scrollmine_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the extension's core logic.
//! These traits form the boundary of the hexagonal architecture: the key/value
//! store, the hosted backend, the text generator, the page document and the
//! extension host are all reached through them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{AuthGrant, ItemType, Platform, SavedItem};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote service answered with a non-success status and this message.
    #[error("{0}")]
    Remote(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Extension Key/Value Storage
//=========================================================================================

/// A read-modify-write step applied atomically by [`KeyValueStore::update`].
///
/// Receives the current value (if any) and returns the value to store;
/// `None` removes the key.
pub type UpdateFn<'a> = Box<dyn FnOnce(Option<Value>) -> PortResult<Option<Value>> + Send + 'a>;

/// Extension-local persistent key/value storage, readable from every context.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;

    /// Applies `apply` to the current value with no other write to `key`
    /// interleaving between the read and the write.
    async fn update(&self, key: &str, apply: UpdateFn<'_>) -> PortResult<()>;
}

//=========================================================================================
// Hosted Backend
//=========================================================================================

/// The body of an item-creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRemoteItem {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
    pub content: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Partial update of an item's mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// The body of a generated-content creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRemoteGenerated {
    pub user_id: String,
    pub item_ids: Vec<String>,
    pub draft_text: String,
    pub platform: Platform,
    pub is_final: bool,
}

/// The hosted CRUD API for saved items and generated content.
#[async_trait]
pub trait BackendService: Send + Sync {
    /// Exchanges email and password for a session grant.
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthGrant>;

    /// Registers a new account. `None` means the backend wants the email
    /// confirmed before it issues a session.
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<AuthGrant>>;

    async fn create_item(&self, access_token: &str, item: &NewRemoteItem) -> PortResult<SavedItem>;

    async fn update_item(&self, access_token: &str, id: &str, patch: &ItemPatch) -> PortResult<()>;

    async fn delete_item(&self, access_token: &str, id: &str) -> PortResult<()>;

    async fn create_generated(
        &self,
        access_token: &str,
        content: &NewRemoteGenerated,
    ) -> PortResult<()>;
}

//=========================================================================================
// Text Generation
//=========================================================================================

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// `None` leaves sampling to the provider's defaults.
    pub sampling: Option<SamplingConfig>,
}

/// An opaque prompt-in, text-out generation service.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<String>;
}

//=========================================================================================
// Page Document and Extension Host
//=========================================================================================

/// Read-only view of the document a content script is injected into.
///
/// Every accessor returns `None` when the underlying API is unavailable.
pub trait PageDocument: Send + Sync {
    fn title(&self) -> Option<String>;

    fn url(&self) -> Option<String>;

    fn hostname(&self) -> Option<String>;

    /// The text of the current selection range.
    fn selection_text(&self) -> Option<String>;

    /// Text content of the first element matching `selector`.
    fn select_text(&self, selector: &str) -> Option<String>;

    /// Text content of the body with every element matching one of
    /// `excluded` removed.
    fn body_text_excluding(&self, excluded: &[&str]) -> Option<String>;

    /// The `content` attribute of the first element matching `selector`.
    fn meta_content(&self, selector: &str) -> Option<String>;
}

/// Browser-level actions only the background context may perform.
pub trait ExtensionHost: Send + Sync {
    fn open_popup(&self) -> PortResult<()>;
}
