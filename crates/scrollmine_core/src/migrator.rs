//! crates/scrollmine_core/src/migrator.rs
//!
//! One-shot copy of everything in the local library to the hosted backend,
//! run after sign-in when local data exists.
//!
//! The pass is best effort: each record is created remotely on its own, a
//! failure is logged and skipped, and both local lists are cleared once the
//! pass is over. Every successful create is recorded on the local record
//! before moving on, so an interrupted pass that is run again skips what was
//! already copied.

use std::sync::Arc;

use tracing::{info, warn};

use crate::library::LocalLibrary;
use crate::ports::{BackendService, NewRemoteGenerated, NewRemoteItem, PortError, PortResult};
use crate::session::SessionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub items_migrated: usize,
    pub items_failed: usize,
    pub generated_migrated: usize,
    pub generated_failed: usize,
    /// Records already marked as migrated by an earlier, interrupted pass.
    pub skipped: usize,
}

impl MigrationReport {
    pub fn migrated(&self) -> usize {
        self.items_migrated + self.generated_migrated
    }

    pub fn failed(&self) -> usize {
        self.items_failed + self.generated_failed
    }
}

#[derive(Clone)]
pub struct Migrator {
    sessions: SessionStore,
    library: LocalLibrary,
    backend: Arc<dyn BackendService>,
}

impl Migrator {
    pub fn new(
        sessions: SessionStore,
        library: LocalLibrary,
        backend: Arc<dyn BackendService>,
    ) -> Self {
        Self {
            sessions,
            library,
            backend,
        }
    }

    pub async fn has_local_data(&self) -> PortResult<bool> {
        Ok(!self.library.is_empty().await?)
    }

    /// Copies every local record to the backend under `user_id`, then clears
    /// the local lists.
    pub async fn migrate(&self, user_id: &str) -> PortResult<MigrationReport> {
        let session = self
            .sessions
            .get_session()
            .await?
            .ok_or(PortError::Unauthorized)?;
        let token = session.access_token.as_str();
        let mut report = MigrationReport::default();

        for item in self.library.items().await? {
            if item.migrated {
                report.skipped += 1;
                continue;
            }
            let record = NewRemoteItem {
                user_id: user_id.to_string(),
                url: item.url.clone(),
                title: item.title.clone(),
                snippet: item.snippet.clone(),
                content: item.content.clone(),
                tags: item.tags.clone(),
                item_type: item.item_type,
                is_favorite: Some(item.is_favorite),
                usage_count: Some(item.usage_count),
                last_used_at: item.last_used_at,
            };
            match self.backend.create_item(token, &record).await {
                Ok(_) => {
                    self.library.mark_item_migrated(&item.id).await?;
                    report.items_migrated += 1;
                }
                Err(e) => {
                    warn!("Failed to migrate item {}: {}", item.id, e);
                    report.items_failed += 1;
                }
            }
        }

        for content in self.library.generated().await? {
            if content.migrated {
                report.skipped += 1;
                continue;
            }
            let record = NewRemoteGenerated {
                user_id: user_id.to_string(),
                item_ids: content.item_ids.clone(),
                draft_text: content.content.clone(),
                platform: content.platform,
                is_final: false,
            };
            match self.backend.create_generated(token, &record).await {
                Ok(()) => {
                    self.library.mark_generated_migrated(&content.id).await?;
                    report.generated_migrated += 1;
                }
                Err(e) => {
                    warn!("Failed to migrate generated content {}: {}", content.id, e);
                    report.generated_failed += 1;
                }
            }
        }

        self.library.clear().await?;
        info!(
            "Migration finished: {} migrated, {} failed, {} skipped",
            report.migrated(),
            report.failed(),
            report.skipped
        );
        Ok(report)
    }
}
