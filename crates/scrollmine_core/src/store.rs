//! crates/scrollmine_core/src/store.rs
//!
//! Storage keys shared by every context, typed helpers over the raw JSON
//! values, and an in-process `KeyValueStore` used by the test suites and by
//! hosts without persistent storage.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ports::{KeyValueStore, PortError, PortResult, UpdateFn};

/// Keys of the persisted extension state.
pub mod keys {
    pub const SESSION: &str = "scrollmine_session";
    pub const AUTH_TOKEN: &str = "scrollmine_token";
    pub const BUBBLE_ENABLED: &str = "bubbleEnabled";
    pub const BUBBLE_POSITION: &str = "bubblePosition";
    pub const SAVED_ITEMS: &str = "savedItems";
    pub const GENERATED_CONTENT: &str = "generatedContent";
    pub const USER_PREFERENCES: &str = "scrollmine_user_preferences";
}

/// Reads `key` and deserializes it.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> PortResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PortError::Storage(format!("corrupt value under '{}': {}", key, e))),
        None => Ok(None),
    }
}

/// Serializes `value` and writes it under `key`.
pub async fn set_typed<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> PortResult<()> {
    let value = serde_json::to_value(value).map_err(|e| PortError::Storage(e.to_string()))?;
    store.set(key, value).await
}

/// Atomically edits the JSON list stored under `key`, returning whatever
/// `edit` returns. A missing key reads as an empty list.
pub async fn update_list<T, R, F>(store: &dyn KeyValueStore, key: &str, edit: F) -> PortResult<R>
where
    T: Serialize + DeserializeOwned,
    R: Send,
    F: FnOnce(&mut Vec<T>) -> PortResult<R> + Send,
{
    let mut outcome = None;
    let slot = &mut outcome;
    store
        .update(
            key,
            Box::new(move |current: Option<Value>| {
                let mut list: Vec<T> = match current {
                    Some(value) => serde_json::from_value(value)
                        .map_err(|e| PortError::Storage(format!("corrupt list '{}': {}", key, e)))?,
                    None => Vec::new(),
                };
                let result = edit(&mut list)?;
                *slot = Some(result);
                let value =
                    serde_json::to_value(&list).map_err(|e| PortError::Storage(e.to_string()))?;
                Ok(Some(value))
            }),
        )
        .await?;

    outcome.ok_or_else(|| PortError::Unexpected(format!("update of '{}' did not run", key)))
}

//=========================================================================================
// In-process store
//=========================================================================================

/// A `KeyValueStore` kept in memory behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> PortResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn update(&self, key: &str, apply: UpdateFn<'_>) -> PortResult<()> {
        let mut entries = self.entries.lock().await;
        let current = entries.get(key).cloned();
        match apply(current)? {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}
