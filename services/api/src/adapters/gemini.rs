//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini `generateContent` endpoint.
//! It implements the `TextGenerationService` port from the `core` crate.

use async_trait::async_trait;
use reqwest::Client;
use scrollmine_core::ports::{
    GenerationRequest, PortError, PortResult, SamplingConfig, TextGenerationService,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const EMPTY_REPLY: &str = "No response generated";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<SamplingConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl GenerateReply {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

//=========================================================================================
// Adapter
//=========================================================================================

#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextGenerationService for GeminiAdapter {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<String> {
        let body = GenerateBody {
            contents: [Content {
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.sampling,
        };

        debug!("Requesting generation ({} prompt chars)", request.prompt.len());
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {}", e);
                PortError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorReply>(&text)
                .ok()
                .and_then(|reply| reply.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| format!("Gemini API error: {}", status));
            error!("Gemini API error: {}", message);
            return Err(PortError::Remote(message));
        }

        let reply: GenerateReply = serde_json::from_str(&text)
            .map_err(|e| PortError::Unexpected(format!("Malformed Gemini response: {}", e)))?;
        reply
            .first_text()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| PortError::Remote(EMPTY_REPLY.to_string()))
    }
}
