//! crates/scrollmine_core/src/assistant.rs
//!
//! Turns a captured page context plus a user instruction into a single
//! prompt and forwards it to the text generation port.

use std::sync::Arc;

use tracing::{debug, error};

use crate::domain::PageSnapshot;
use crate::ports::{GenerationRequest, PortResult, SamplingConfig, TextGenerationService};

/// Characters of page content embedded in a prompt.
pub const PROMPT_CONTENT_CHARS: usize = 2000;

/// Sampling used for every assistant request.
pub const ASSISTANT_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 1024,
};

const CLOSING_DIRECTIVE: &str = "Please provide a helpful response based on the above context.";

/// Builds the combined prompt; empty selection and content lines are left out.
pub fn build_prompt(context: &PageSnapshot, instruction: &str) -> String {
    let mut lines = vec![
        format!("Context: {}", context.title),
        format!("URL: {}", context.url),
    ];
    if !context.selected_text.is_empty() {
        lines.push(format!("Selected Text: {}", context.selected_text));
    }
    if !context.content.is_empty() {
        let excerpt: String = context.content.chars().take(PROMPT_CONTENT_CHARS).collect();
        lines.push(format!("Page Content: {}...", excerpt));
    }

    format!(
        "{}\n\nUser Request: {}\n\n{}",
        lines.join("\n"),
        instruction,
        CLOSING_DIRECTIVE
    )
}

#[derive(Clone)]
pub struct AiGateway {
    generator: Arc<dyn TextGenerationService>,
}

impl AiGateway {
    pub fn new(generator: Arc<dyn TextGenerationService>) -> Self {
        Self { generator }
    }

    pub async fn complete(&self, context: &PageSnapshot, instruction: &str) -> PortResult<String> {
        let request = GenerationRequest {
            prompt: build_prompt(context, instruction),
            sampling: Some(ASSISTANT_SAMPLING),
        };
        debug!("Requesting completion for page '{}'", context.title);

        self.generator.generate(&request).await.map_err(|e| {
            error!("AI request failed: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use crate::testing::FakeGenerator;

    fn context() -> PageSnapshot {
        PageSnapshot {
            title: "Ownership".into(),
            url: "https://doc.rust-lang.org/book/ch04".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_without_selection_or_content() {
        let prompt = build_prompt(&context(), "Explain it");
        assert_eq!(
            prompt,
            "Context: Ownership\nURL: https://doc.rust-lang.org/book/ch04\n\n\
             User Request: Explain it\n\n\
             Please provide a helpful response based on the above context."
        );
    }

    #[test]
    fn test_prompt_embeds_selection_and_capped_content() {
        let mut ctx = context();
        ctx.selected_text = "borrowing".into();
        ctx.content = "é".repeat(2500);

        let prompt = build_prompt(&ctx, "Summarize");

        assert!(prompt.contains("\nSelected Text: borrowing\n"));
        let expected = format!("Page Content: {}...\n\nUser Request: Summarize", "é".repeat(2000));
        assert!(prompt.contains(&expected));
    }

    #[tokio::test]
    async fn test_complete_uses_fixed_sampling() {
        let generator = Arc::new(FakeGenerator::replying("Sure."));
        let gateway = AiGateway::new(generator.clone());

        let reply = gateway.complete(&context(), "Explain it").await.unwrap();

        assert_eq!(reply, "Sure.");
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].sampling, Some(ASSISTANT_SAMPLING));
        assert!(requests[0].prompt.starts_with("Context: Ownership\n"));
    }

    #[tokio::test]
    async fn test_complete_propagates_failure() {
        let gateway = AiGateway::new(Arc::new(FakeGenerator::failing(PortError::Remote(
            "API key not valid".into(),
        ))));

        let result = gateway.complete(&context(), "Explain it").await;
        assert_eq!(result, Err(PortError::Remote("API key not valid".into())));
    }
}
