//! crates/scrollmine_core/src/library.rs
//!
//! The locally persisted saved-item and generated-content lists.
//!
//! Every mutation goes through `store::update_list`, so a save racing a
//! favorite toggle (or a migration clear) is applied one after the other
//! instead of the later write silently discarding the earlier one.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{GeneratedContent, Platform, SavedItem, SavedItemInput};
use crate::ports::{KeyValueStore, PortError, PortResult};
use crate::store::{get_typed, keys, update_list};

#[derive(Clone)]
pub struct LocalLibrary {
    store: Arc<dyn KeyValueStore>,
}

impl LocalLibrary {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    //-------------------------------------------------------------------------------------
    // Saved items
    //-------------------------------------------------------------------------------------

    /// All local items, newest first.
    pub async fn items(&self) -> PortResult<Vec<SavedItem>> {
        Ok(get_typed(self.store.as_ref(), keys::SAVED_ITEMS)
            .await?
            .unwrap_or_default())
    }

    /// Creates a local item and puts it at the head of the list.
    pub async fn insert_item(
        &self,
        input: SavedItemInput,
        now: DateTime<Utc>,
    ) -> PortResult<SavedItem> {
        let item = SavedItem::new_local(input, now);
        let stored = item.clone();
        update_list(self.store.as_ref(), keys::SAVED_ITEMS, move |items: &mut Vec<SavedItem>| {
            items.insert(0, stored);
            Ok(())
        })
        .await?;
        Ok(item)
    }

    /// Flips `is_favorite` and returns the new value.
    pub async fn toggle_favorite(&self, id: &str) -> PortResult<bool> {
        self.edit_item(id, |item| {
            item.is_favorite = !item.is_favorite;
            item.is_favorite
        })
        .await
    }

    /// Records one more use of the item as generation input; returns the new count.
    pub async fn increment_usage(&self, id: &str, now: DateTime<Utc>) -> PortResult<u32> {
        self.edit_item(id, move |item| {
            item.usage_count += 1;
            item.last_used_at = Some(now);
            item.usage_count
        })
        .await
    }

    /// Removes the item; `false` when no item had that id.
    pub async fn delete_item(&self, id: &str) -> PortResult<bool> {
        update_list(self.store.as_ref(), keys::SAVED_ITEMS, |items: &mut Vec<SavedItem>| {
            let before = items.len();
            items.retain(|item| item.id != id);
            Ok(items.len() < before)
        })
        .await
    }

    pub async fn mark_item_migrated(&self, id: &str) -> PortResult<()> {
        self.edit_item(id, |item| item.migrated = true).await
    }

    async fn edit_item<R, F>(&self, id: &str, edit: F) -> PortResult<R>
    where
        R: Send,
        F: FnOnce(&mut SavedItem) -> R + Send,
    {
        update_list(self.store.as_ref(), keys::SAVED_ITEMS, |items: &mut Vec<SavedItem>| {
            items
                .iter_mut()
                .find(|item| item.id == id)
                .map(edit)
                .ok_or_else(|| PortError::NotFound(id.to_string()))
        })
        .await
    }

    //-------------------------------------------------------------------------------------
    // Generated content
    //-------------------------------------------------------------------------------------

    pub async fn generated(&self) -> PortResult<Vec<GeneratedContent>> {
        Ok(get_typed(self.store.as_ref(), keys::GENERATED_CONTENT)
            .await?
            .unwrap_or_default())
    }

    pub async fn insert_generated(
        &self,
        platform: Platform,
        content: String,
        item_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> PortResult<GeneratedContent> {
        let generated = GeneratedContent::new_local(platform, content, item_ids, now);
        let stored = generated.clone();
        update_list(
            self.store.as_ref(),
            keys::GENERATED_CONTENT,
            move |list: &mut Vec<GeneratedContent>| {
                list.insert(0, stored);
                Ok(())
            },
        )
        .await?;
        Ok(generated)
    }

    pub async fn finalize_generated(&self, id: &str) -> PortResult<()> {
        self.edit_generated(id, |content| content.is_final = true).await
    }

    pub async fn delete_generated(&self, id: &str) -> PortResult<bool> {
        update_list(
            self.store.as_ref(),
            keys::GENERATED_CONTENT,
            |list: &mut Vec<GeneratedContent>| {
                let before = list.len();
                list.retain(|content| content.id != id);
                Ok(list.len() < before)
            },
        )
        .await
    }

    pub async fn mark_generated_migrated(&self, id: &str) -> PortResult<()> {
        self.edit_generated(id, |content| content.migrated = true).await
    }

    async fn edit_generated<R, F>(&self, id: &str, edit: F) -> PortResult<R>
    where
        R: Send,
        F: FnOnce(&mut GeneratedContent) -> R + Send,
    {
        update_list(
            self.store.as_ref(),
            keys::GENERATED_CONTENT,
            |list: &mut Vec<GeneratedContent>| {
                list.iter_mut()
                    .find(|content| content.id == id)
                    .map(edit)
                    .ok_or_else(|| PortError::NotFound(id.to_string()))
            },
        )
        .await
    }

    //-------------------------------------------------------------------------------------
    // Whole-library operations
    //-------------------------------------------------------------------------------------

    pub async fn is_empty(&self) -> PortResult<bool> {
        Ok(self.items().await?.is_empty() && self.generated().await?.is_empty())
    }

    /// Drops both lists.
    pub async fn clear(&self) -> PortResult<()> {
        self.store.remove(keys::SAVED_ITEMS).await?;
        self.store.remove(keys::GENERATED_CONTENT).await
    }
}
