//! crates/scrollmine_core/src/domain.rs
//!
//! Defines the core data structures shared by every extension context.
//! These are also the shapes persisted in the extension key/value store, so
//! their serde attributes are part of the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Saved Items
//=========================================================================================

/// The kind of content a saved item was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Article,
    Tweet,
    Video,
    Draft,
    Other,
}

/// The payload of a save request, before any identity is assigned.
///
/// This is also the `data` field of the `saveContent` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItemInput {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
}

/// A captured unit of content, stored either remotely or in the local list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Set on a local record once its remote copy has been created.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub migrated: bool,
}

impl SavedItem {
    /// Builds a fresh local record from a save request.
    pub fn new_local(input: SavedItemInput, now: DateTime<Utc>) -> Self {
        Self {
            id: local_id("local", now),
            url: input.url,
            title: input.title,
            snippet: input.snippet,
            content: input.content,
            tags: input.tags,
            item_type: input.item_type,
            created_at: now,
            is_favorite: false,
            usage_count: 0,
            last_used_at: None,
            migrated: false,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_id(&self.id)
    }
}

//=========================================================================================
// Generated Content
//=========================================================================================

/// Target platform of an AI-produced draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
    #[default]
    General,
    Draft,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::General => "general",
            Platform::Draft => "draft",
        }
    }
}

/// An AI-produced draft and the saved items it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: String,
    pub platform: Platform,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub migrated: bool,
}

impl GeneratedContent {
    pub fn new_local(
        platform: Platform,
        content: String,
        item_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: local_id("local_gen", now),
            platform,
            content,
            timestamp: now,
            item_ids,
            is_final: false,
            migrated: false,
        }
    }
}

//=========================================================================================
// Authentication
//=========================================================================================

/// The signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The persisted authentication state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: SessionUser,
}

impl Session {
    /// A session is live only while `expires_at` is present and strictly in the future.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at > now)
    }

    pub fn from_grant(grant: AuthGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: Some(now + chrono::Duration::seconds(grant.expires_in)),
            user: grant.user,
        }
    }
}

/// The credential-exchange response of the backend's token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user: SessionUser,
}

//=========================================================================================
// Widget Preferences
//=========================================================================================

/// Viewport-relative bubble position in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BubblePosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubblePreferences {
    pub bubble_enabled: bool,
    pub bubble_position: Option<BubblePosition>,
}

impl Default for BubblePreferences {
    fn default() -> Self {
        Self {
            bubble_enabled: true,
            bubble_position: None,
        }
    }
}

//=========================================================================================
// Page Context
//=========================================================================================

/// Social platforms the content script recognizes from the page host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Twitter,
    Linkedin,
    Facebook,
    Instagram,
    Youtube,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Linkedin => "linkedin",
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Youtube => "youtube",
        }
    }
}

/// A point-in-time capture of the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub selected_text: String,
    pub content: String,
    pub platform: Option<SocialPlatform>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

/// Descriptive `<meta>` information of the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: String,
    pub url: String,
    pub description: String,
    pub author: String,
    pub published_date: String,
    pub tags: Vec<String>,
}

//=========================================================================================
// Local Identifiers
//=========================================================================================

/// Builds `<prefix>_<epoch-ms>_<9-char base36>`.
pub fn local_id(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}_{}", prefix, now.timestamp_millis(), random_base36(9))
}

/// Local records are the only ones whose id starts with `local_`.
pub fn is_local_id(id: &str) -> bool {
    id.starts_with("local_")
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bits = Uuid::new_v4().as_u128();
    (0..len)
        .map(|_| {
            let digit = (bits % 36) as usize;
            bits /= 36;
            ALPHABET[digit] as char
        })
        .collect()
}
