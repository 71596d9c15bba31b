//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the AI proxy endpoints and the master
//! definition for the OpenAPI specification.
//!
//! The proxy keeps the generation key on the server: clients send a prompt
//! (or a page context plus an instruction) and get plain text back.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use scrollmine_core::domain::PageSnapshot;
use scrollmine_core::ports::{GenerationRequest, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_content_handler,
        assist_handler,
        health_handler,
    ),
    components(
        schemas(
            GenerateContentRequest,
            GenerateContentResponse,
            AssistRequest,
            AssistResponse,
            HealthResponse,
            MessageBody
        )
    ),
    tags(
        (name = "ScrollMine API", description = "Server-side AI proxy for the ScrollMine extension and dashboard.")
    )
)]
pub struct ApiDoc;

/// Builds the API routes over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/generate-content", post(generate_content_handler))
        .route("/api/assist", post(assist_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

pub const MISSING_FIELDS: &str = "Missing required fields";
pub const NOT_CONFIGURED: &str = "AI service not configured";
pub const NO_CONTENT: &str = "No content generated from AI";

/// The `{message}` body every failed request answers with.
#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct MessageBody {
    pub message: String,
}

type HandlerError = (StatusCode, Json<MessageBody>);

fn fail(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(MessageBody {
            message: message.into(),
        }),
    )
}

fn upstream_failure(e: &PortError) -> HandlerError {
    let detail = match e {
        PortError::Remote(message) => message.clone(),
        other => other.to_string(),
    };
    fail(StatusCode::BAD_GATEWAY, format!("AI generation failed: {}", detail))
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateContentRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Accepted for compatibility; the prompt already embeds the source items.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct GenerateContentResponse {
    pub content: String,
    pub platform: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct AssistRequest {
    /// The captured page: `{title, url, selectedText, content, platform, type}`.
    #[schema(value_type = Object)]
    pub context: PageSnapshot,
    pub instruction: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct AssistResponse {
    pub content: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub ai_configured: bool,
    pub model: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a platform post from a prepared prompt.
#[utoipa::path(
    post,
    path = "/api/generate-content",
    request_body = GenerateContentRequest,
    responses(
        (status = 200, description = "Generated text", body = GenerateContentResponse),
        (status = 400, description = "Missing prompt or platform", body = MessageBody),
        (status = 500, description = "AI service not configured or empty reply", body = MessageBody),
        (status = 502, description = "The AI provider rejected the request", body = MessageBody)
    )
)]
pub async fn generate_content_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateContentRequest>,
) -> Result<Json<GenerateContentResponse>, HandlerError> {
    let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
    if !present(&payload.prompt) || !present(&payload.platform) {
        return Err(fail(StatusCode::BAD_REQUEST, MISSING_FIELDS));
    }
    let prompt = payload.prompt.unwrap_or_default();
    let platform = payload.platform.unwrap_or_default();

    let generator = app_state.generator.as_ref().ok_or_else(|| {
        error!("GEMINI_API_KEY not configured");
        fail(StatusCode::INTERNAL_SERVER_ERROR, NOT_CONFIGURED)
    })?;

    let request = GenerationRequest {
        prompt,
        sampling: None,
    };
    let text = generator.generate(&request).await.map_err(|e| {
        error!("AI generation error: {}", e);
        upstream_failure(&e)
    })?;

    let content = text.trim().to_string();
    if content.is_empty() {
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, NO_CONTENT));
    }
    info!("Generated {} chars for {}", content.len(), platform);
    Ok(Json(GenerateContentResponse {
        content,
        platform,
        timestamp: Utc::now(),
    }))
}

/// Answer an instruction about a captured page.
#[utoipa::path(
    post,
    path = "/api/assist",
    request_body = AssistRequest,
    responses(
        (status = 200, description = "Assistant reply", body = AssistResponse),
        (status = 400, description = "Missing instruction", body = MessageBody),
        (status = 500, description = "AI service not configured", body = MessageBody),
        (status = 502, description = "The AI provider rejected the request", body = MessageBody)
    )
)]
pub async fn assist_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<AssistRequest>,
) -> Result<Json<AssistResponse>, HandlerError> {
    if payload.instruction.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, MISSING_FIELDS));
    }
    let assistant = app_state
        .assistant()
        .ok_or_else(|| fail(StatusCode::INTERNAL_SERVER_ERROR, NOT_CONFIGURED))?;

    let content = assistant
        .complete(&payload.context, payload.instruction.trim())
        .await
        .map_err(|e| upstream_failure(&e))?;
    Ok(Json(AssistResponse { content }))
}

/// Liveness plus the generation setup.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ai_configured: app_state.generator.is_some(),
        model: app_state.config.gemini_model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use scrollmine_core::ports::{PortResult, TextGenerationService};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct ScriptedGenerator {
        reply: PortResult<String>,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenerationService for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> PortResult<String> {
            self.prompts.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    async fn serve(reply: Option<PortResult<String>>) -> (String, Option<Arc<ScriptedGenerator>>) {
        let generator = reply.map(|reply| {
            Arc::new(ScriptedGenerator {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        });
        let state = Arc::new(AppState {
            config: Arc::new(Config::from_lookup(|_| None).unwrap()),
            generator: generator
                .clone()
                .map(|g| g as Arc<dyn TextGenerationService>),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        (format!("http://{}", addr), generator)
    }

    async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_generate_content_returns_trimmed_text() {
        let (base, generator) = serve(Some(Ok("  A fresh post \n".into()))).await;

        let (status, body) = post(
            &base,
            "/api/generate-content",
            json!({"prompt": "Write", "platform": "twitter"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["content"], "A fresh post");
        assert_eq!(body["platform"], "twitter");
        assert!(body["timestamp"].is_string());
        assert_eq!(generator.unwrap().prompts.lock().unwrap()[0].sampling, None);
    }

    #[tokio::test]
    async fn test_generate_content_requires_fields() {
        let (base, _) = serve(Some(Ok("unused".into()))).await;

        let (status, body) = post(&base, "/api/generate-content", json!({"prompt": "Write"})).await;

        assert_eq!(status, 400);
        assert_eq!(body, json!({"message": MISSING_FIELDS}));
    }

    #[tokio::test]
    async fn test_generate_content_without_key() {
        let (base, _) = serve(None).await;

        let (status, body) = post(
            &base,
            "/api/generate-content",
            json!({"prompt": "Write", "platform": "linkedin"}),
        )
        .await;

        assert_eq!(status, 500);
        assert_eq!(body, json!({"message": NOT_CONFIGURED}));
    }

    #[tokio::test]
    async fn test_generate_content_upstream_failure() {
        let (base, _) = serve(Some(Err(PortError::Remote("Quota exceeded".into())))).await;

        let (status, body) = post(
            &base,
            "/api/generate-content",
            json!({"prompt": "Write", "platform": "general"}),
        )
        .await;

        assert_eq!(status, 502);
        assert_eq!(body["message"], "AI generation failed: Quota exceeded");
    }

    #[tokio::test]
    async fn test_assist_builds_page_prompt() {
        let (base, generator) = serve(Some(Ok("Here is a summary".into()))).await;

        let (status, body) = post(
            &base,
            "/api/assist",
            json!({
                "context": {
                    "title": "Ownership",
                    "url": "https://doc.rust-lang.org",
                    "selectedText": "",
                    "content": "Each value has an owner.",
                    "platform": null,
                    "type": "article"
                },
                "instruction": "Summarize"
            }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["content"], "Here is a summary");
        let prompts = generator.unwrap().prompts.lock().unwrap().clone();
        assert!(prompts[0].prompt.starts_with("Context: Ownership\nURL: https://doc.rust-lang.org"));
        assert!(prompts[0].prompt.contains("User Request: Summarize"));
        assert!(prompts[0].sampling.is_some());
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let (base, _) = serve(None).await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body,
            json!({"status": "ok", "ai_configured": false, "model": "gemini-2.0-flash"})
        );
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/generate-content"));
        assert!(doc.paths.paths.contains_key("/api/assist"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
