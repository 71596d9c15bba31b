//! crates/scrollmine_core/src/prefs.rs
//!
//! Widget preferences and the free-form user-preferences blob.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{BubblePosition, BubblePreferences};
use crate::ports::{KeyValueStore, PortResult};
use crate::store::{get_typed, keys, set_typed};

#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads both bubble keys; the bubble is enabled unless explicitly disabled.
    pub async fn bubble(&self) -> PortResult<BubblePreferences> {
        let enabled = get_typed::<bool>(self.store.as_ref(), keys::BUBBLE_ENABLED).await?;
        let position =
            get_typed::<BubblePosition>(self.store.as_ref(), keys::BUBBLE_POSITION).await?;
        Ok(BubblePreferences {
            bubble_enabled: enabled.unwrap_or(true),
            bubble_position: position,
        })
    }

    pub async fn set_bubble_enabled(&self, enabled: bool) -> PortResult<()> {
        set_typed(self.store.as_ref(), keys::BUBBLE_ENABLED, &enabled).await
    }

    pub async fn set_bubble_position(&self, position: BubblePosition) -> PortResult<()> {
        set_typed(self.store.as_ref(), keys::BUBBLE_POSITION, &position).await
    }

    /// The user-preferences blob; an empty object when nothing was saved.
    pub async fn user_preferences(&self) -> PortResult<Value> {
        Ok(self
            .store
            .get(keys::USER_PREFERENCES)
            .await?
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    pub async fn set_user_preferences(&self, preferences: Value) -> PortResult<()> {
        self.store.set(keys::USER_PREFERENCES, preferences).await
    }
}
