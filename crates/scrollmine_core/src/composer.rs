//! crates/scrollmine_core/src/composer.rs
//!
//! Generates platform-specific social posts from a selection of saved items.
//! Generated drafts follow the same dual-mode rule as saves: they are stored
//! remotely while a session is live and in the local library otherwise.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{is_local_id, GeneratedContent, Platform, SavedItem};
use crate::gateway::PersistenceGateway;
use crate::ports::{
    BackendService, GenerationRequest, NewRemoteGenerated, PortError, PortResult,
    TextGenerationService,
};

/// Characters of each item's content included in a generation prompt.
pub const ITEM_CONTENT_CHARS: usize = 1000;

fn platform_instruction(platform: Platform) -> &'static str {
    match platform {
        Platform::Twitter => "Create an engaging Twitter post based on this content. Make it conversational, include relevant hashtags, and keep it under 280 characters. Focus on the most interesting insights and make it shareable.",
        Platform::Linkedin => "Create a professional LinkedIn post based on this content. Make it insightful, include bullet points for key takeaways, and encourage professional discussion. Keep it professional but engaging.",
        Platform::Instagram => "Create an Instagram caption based on this content. Make it visually descriptive, include emojis, and encourage engagement. Focus on inspiration and community.",
        Platform::General | Platform::Draft => "Create a general social media post based on this content. Make it engaging and shareable across different platforms. Include key insights and encourage discussion.",
    }
}

fn describe_item(item: &SavedItem) -> String {
    let mut text = format!("Title: {}\n", item.title);
    if let Some(snippet) = item.snippet.as_deref().filter(|s| !s.is_empty()) {
        text.push_str(&format!("Snippet: {}\n", snippet));
    }
    if let Some(content) = item.content.as_deref().filter(|c| !c.is_empty()) {
        let excerpt: String = content.chars().take(ITEM_CONTENT_CHARS).collect();
        text.push_str(&format!("Content: {}...\n", excerpt));
    }
    if !item.tags.is_empty() {
        text.push_str(&format!("Tags: {}\n", item.tags.join(", ")));
    }
    text
}

pub fn build_generation_prompt(items: &[SavedItem], platform: Platform) -> String {
    let material = items
        .iter()
        .map(describe_item)
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!(
        "{}\n\nContent to analyze:\n{}\n\nGenerate a {} post:",
        platform_instruction(platform),
        material,
        platform.as_str()
    )
}

#[derive(Clone)]
pub struct DraftComposer {
    gateway: PersistenceGateway,
    backend: Arc<dyn BackendService>,
    generator: Arc<dyn TextGenerationService>,
}

impl DraftComposer {
    pub fn new(
        gateway: PersistenceGateway,
        backend: Arc<dyn BackendService>,
        generator: Arc<dyn TextGenerationService>,
    ) -> Self {
        Self {
            gateway,
            backend,
            generator,
        }
    }

    /// Generates a post from `items`, counts their usage and stores the draft.
    pub async fn generate(
        &self,
        items: &[SavedItem],
        platform: Platform,
    ) -> PortResult<GeneratedContent> {
        if items.is_empty() {
            return Err(PortError::Invalid(
                "Please select at least one item to generate content from".to_string(),
            ));
        }

        let request = GenerationRequest {
            prompt: build_generation_prompt(items, platform),
            sampling: None,
        };
        let text = self.generator.generate(&request).await?.trim().to_string();
        if text.is_empty() {
            return Err(PortError::Remote("No content generated from AI".to_string()));
        }

        self.gateway.record_usage(items).await?;

        let item_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let now = Utc::now();
        let generated = match self.gateway.sessions().get_session().await? {
            Some(session) => {
                let record = NewRemoteGenerated {
                    user_id: session.user.id.clone(),
                    item_ids: item_ids.clone(),
                    draft_text: text.clone(),
                    platform,
                    is_final: false,
                };
                self.backend
                    .create_generated(&session.access_token, &record)
                    .await?;
                GeneratedContent {
                    id: uuid::Uuid::new_v4().to_string(),
                    platform,
                    content: text,
                    timestamp: now,
                    item_ids,
                    is_final: false,
                    migrated: false,
                }
            }
            None => {
                self.gateway
                    .library()
                    .insert_generated(platform, text, item_ids, now)
                    .await?
            }
        };

        info!(
            "Generated {} post {} from {} item(s)",
            platform.as_str(),
            generated.id,
            items.len()
        );
        Ok(generated)
    }

    /// Marks a draft as final.
    pub async fn finalize(&self, content: &GeneratedContent) -> PortResult<()> {
        if is_local_id(&content.id) {
            return self.gateway.library().finalize_generated(&content.id).await;
        }
        let session = self
            .gateway
            .sessions()
            .get_session()
            .await?
            .ok_or(PortError::Unauthorized)?;
        let record = NewRemoteGenerated {
            user_id: session.user.id.clone(),
            item_ids: content.item_ids.clone(),
            draft_text: content.content.clone(),
            platform: content.platform,
            is_final: true,
        };
        self.backend
            .create_generated(&session.access_token, &record)
            .await
    }

    /// Removes a locally stored draft.
    pub async fn delete(&self, id: &str) -> PortResult<()> {
        match self.gateway.library().delete_generated(id).await? {
            true => Ok(()),
            false => {
                warn!("No local generated content with id {}", id);
                Err(PortError::NotFound(id.to_string()))
            }
        }
    }
}
