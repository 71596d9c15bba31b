//! services/api/src/adapters/backend.rs
//!
//! This module contains the adapter for the hosted ScrollMine backend.
//! It implements the `BackendService` port from the `core` crate over plain
//! REST: every request carries the configured anon key in an `apikey` header,
//! and data requests add the user's bearer token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use scrollmine_core::domain::{AuthGrant, SavedItem};
use scrollmine_core::ports::{
    BackendService, ItemPatch, NewRemoteGenerated, NewRemoteItem, PortError, PortResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Fallback when a failed data request carries no readable message.
pub const SAVE_FAILURE_FALLBACK: &str = "Failed to save to server";
/// Fallback when a failed sign-in carries no readable message.
pub const LOGIN_FAILURE_FALLBACK: &str = "Login failed";
/// Fallback when a failed registration carries no readable message.
pub const SIGNUP_FAILURE_FALLBACK: &str = "Sign up failed";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Item creation answers with the stored row, alone or wrapped in a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Representation {
    One(SavedItem),
    Many(Vec<SavedItem>),
}

//=========================================================================================
// Adapter
//=========================================================================================

#[derive(Clone)]
pub struct RestBackendAdapter {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestBackendAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    async fn send(&self, request: RequestBuilder, fallback: &str) -> PortResult<Response> {
        let response = request.send().await.map_err(|e| {
            error!("Backend request failed: {}", e);
            PortError::Network(e.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!("Backend answered {}: {}", status, body);
        Err(error_from_body(status, &body, fallback))
    }
}

/// Picks the most specific message out of an error body.
fn error_from_body(status: StatusCode, body: &str, fallback: &str) -> PortError {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["message", "error_description", "msg", "error"]
            .iter()
            .find_map(|field| json.get(field).and_then(Value::as_str).map(str::to_string))
    });

    match message {
        Some(message) if !message.trim().is_empty() => PortError::Remote(message),
        _ if status == StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        _ => PortError::Remote(fallback.to_string()),
    }
}

#[async_trait]
impl BackendService for RestBackendAdapter {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        let request = self
            .client
            .post(self.url("/auth/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password });

        let response = self.send(request, LOGIN_FAILURE_FALLBACK).await?;
        response
            .json::<AuthGrant>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed token response: {}", e)))
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<AuthGrant>> {
        let request = self
            .client
            .post(self.url("/auth/signup"))
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password });

        let response = self.send(request, SIGNUP_FAILURE_FALLBACK).await?;
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed signup response: {}", e)))?;

        // With email confirmation on, the reply is the bare user and carries no token.
        if body.get("access_token").is_none() {
            debug!("Signup for {} awaits email confirmation", email);
            return Ok(None);
        }
        serde_json::from_value::<AuthGrant>(body)
            .map(Some)
            .map_err(|e| PortError::Unexpected(format!("Malformed signup response: {}", e)))
    }

    async fn create_item(&self, access_token: &str, item: &NewRemoteItem) -> PortResult<SavedItem> {
        let request = self
            .authed(self.client.post(self.url("/items")), access_token)
            .header("Prefer", "return=representation")
            .json(item);

        let response = self.send(request, SAVE_FAILURE_FALLBACK).await?;
        match response.json::<Representation>().await {
            Ok(Representation::One(saved)) => Ok(saved),
            Ok(Representation::Many(rows)) => rows
                .into_iter()
                .next()
                .ok_or_else(|| PortError::Unexpected("Backend returned no item".to_string())),
            Err(e) => Err(PortError::Unexpected(format!("Malformed item response: {}", e))),
        }
    }

    async fn update_item(&self, access_token: &str, id: &str, patch: &ItemPatch) -> PortResult<()> {
        let request = self
            .authed(self.client.patch(self.url(&format!("/items/{}", id))), access_token)
            .json(patch);
        self.send(request, SAVE_FAILURE_FALLBACK).await?;
        Ok(())
    }

    async fn delete_item(&self, access_token: &str, id: &str) -> PortResult<()> {
        let request = self.authed(
            self.client.delete(self.url(&format!("/items/{}", id))),
            access_token,
        );
        self.send(request, SAVE_FAILURE_FALLBACK).await?;
        Ok(())
    }

    async fn create_generated(
        &self,
        access_token: &str,
        content: &NewRemoteGenerated,
    ) -> PortResult<()> {
        let request = self
            .authed(self.client.post(self.url("/generated")), access_token)
            .json(content);
        self.send(request, SAVE_FAILURE_FALLBACK).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{patch, post},
        Json, Router,
    };
    use scrollmine_core::domain::{ItemType, Platform};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Seen {
        requests: Mutex<Vec<(String, Option<String>, Option<String>, Value)>>,
    }

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn serve(seen: Arc<Seen>) -> String {
        async fn token(
            State(seen): State<Arc<Seen>>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> (AxumStatus, Json<Value>) {
            seen.requests.lock().unwrap().push((
                format!("token:{}", query.get("grant_type").cloned().unwrap_or_default()),
                header(&headers, "apikey"),
                header(&headers, "authorization"),
                body.clone(),
            ));
            if body["password"] == "wrong" {
                return (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
                );
            }
            (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "access",
                    "refresh_token": "refresh",
                    "expires_in": 3600,
                    "token_type": "bearer",
                    "user": {"id": "user-9", "email": body["email"]}
                })),
            )
        }

        async fn signup(
            State(seen): State<Arc<Seen>>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> (AxumStatus, Json<Value>) {
            seen.requests.lock().unwrap().push((
                "signup".into(),
                header(&headers, "apikey"),
                header(&headers, "authorization"),
                body.clone(),
            ));
            if body["email"] == "taken@example.com" {
                return (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"code": 422, "msg": "User already registered"})),
                );
            }
            if body["email"] == "confirm@example.com" {
                return (
                    AxumStatus::OK,
                    Json(json!({
                        "id": "user-10",
                        "email": body["email"],
                        "confirmation_sent_at": "2026-01-02T03:04:05Z"
                    })),
                );
            }
            (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "fresh",
                    "refresh_token": "fresh-refresh",
                    "expires_in": 3600,
                    "token_type": "bearer",
                    "user": {"id": "user-11", "email": body["email"]}
                })),
            )
        }

        async fn items(
            State(seen): State<Arc<Seen>>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> (AxumStatus, Json<Value>) {
            seen.requests.lock().unwrap().push((
                "create".into(),
                header(&headers, "apikey"),
                header(&headers, "authorization"),
                body.clone(),
            ));
            if body["title"] == "dup" {
                return (
                    AxumStatus::CONFLICT,
                    Json(json!({"message": "duplicate key value violates unique constraint"})),
                );
            }
            if body["title"] == "silent" {
                return (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({})));
            }
            let mut row = body.clone();
            row["id"] = json!("row-1");
            row["created_at"] = json!("2026-01-02T03:04:05Z");
            (AxumStatus::CREATED, Json(json!([row])))
        }

        async fn item(
            State(seen): State<Arc<Seen>>,
            Path(id): Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> AxumStatus {
            seen.requests.lock().unwrap().push((
                format!("patch:{}", id),
                header(&headers, "apikey"),
                header(&headers, "authorization"),
                body,
            ));
            AxumStatus::NO_CONTENT
        }

        async fn remove(Path(_id): Path<String>) -> AxumStatus {
            AxumStatus::UNAUTHORIZED
        }

        async fn generated(
            State(seen): State<Arc<Seen>>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> AxumStatus {
            seen.requests.lock().unwrap().push((
                "generated".into(),
                header(&headers, "apikey"),
                header(&headers, "authorization"),
                body,
            ));
            AxumStatus::CREATED
        }

        let app = Router::new()
            .route("/auth/token", post(token))
            .route("/auth/signup", post(signup))
            .route("/items", post(items))
            .route("/items/{id}", patch(item).delete(remove))
            .route("/generated", post(generated))
            .with_state(seen);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn new_item(title: &str) -> NewRemoteItem {
        NewRemoteItem {
            user_id: "user-9".into(),
            url: "https://example.com".into(),
            title: title.into(),
            snippet: Some("snip".into()),
            content: None,
            tags: vec!["a".into()],
            item_type: ItemType::Article,
            is_favorite: None,
            usage_count: None,
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_sends_password_grant_with_anon_key() {
        let seen = Arc::new(Seen::default());
        let adapter = RestBackendAdapter::new(Client::new(), serve(seen.clone()).await, "anon");

        let grant = adapter.sign_in("reader@example.com", "secret").await.unwrap();

        assert_eq!(grant.access_token, "access");
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(grant.user.id, "user-9");
        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests[0].0, "token:password");
        assert_eq!(requests[0].1.as_deref(), Some("anon"));
        assert_eq!(requests[0].2, None);
    }

    #[tokio::test]
    async fn test_sign_in_failure_uses_error_description() {
        let adapter =
            RestBackendAdapter::new(Client::new(), serve(Arc::new(Seen::default())).await, "anon");
        assert_eq!(
            adapter.sign_in("reader@example.com", "wrong").await,
            Err(PortError::Remote("Invalid login credentials".into()))
        );
    }

    #[tokio::test]
    async fn test_sign_up_returns_grant_when_session_is_issued() {
        let seen = Arc::new(Seen::default());
        let adapter = RestBackendAdapter::new(Client::new(), serve(seen.clone()).await, "anon");

        let grant = adapter.sign_up("new@example.com", "secret").await.unwrap().unwrap();

        assert_eq!(grant.access_token, "fresh");
        assert_eq!(grant.user.id, "user-11");
        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests[0].0, "signup");
        assert_eq!(requests[0].1.as_deref(), Some("anon"));
        assert_eq!(requests[0].3, json!({"email": "new@example.com", "password": "secret"}));
    }

    #[tokio::test]
    async fn test_sign_up_awaiting_confirmation_and_rejection() {
        let adapter =
            RestBackendAdapter::new(Client::new(), serve(Arc::new(Seen::default())).await, "anon");

        assert_eq!(adapter.sign_up("confirm@example.com", "secret").await, Ok(None));
        assert_eq!(
            adapter.sign_up("taken@example.com", "secret").await,
            Err(PortError::Remote("User already registered".into()))
        );
    }

    #[tokio::test]
    async fn test_create_item_reads_representation() {
        let seen = Arc::new(Seen::default());
        let adapter = RestBackendAdapter::new(Client::new(), serve(seen.clone()).await, "anon");

        let saved = adapter.create_item("tok", &new_item("hello")).await.unwrap();

        assert_eq!(saved.id, "row-1");
        assert_eq!(saved.title, "hello");
        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests[0].2.as_deref(), Some("Bearer tok"));
        assert_eq!(requests[0].3["type"], "article");
        assert_eq!(requests[0].3["user_id"], "user-9");
        assert!(requests[0].3.get("is_favorite").is_none());
    }

    #[tokio::test]
    async fn test_create_item_error_messages() {
        let adapter =
            RestBackendAdapter::new(Client::new(), serve(Arc::new(Seen::default())).await, "anon");

        assert_eq!(
            adapter.create_item("tok", &new_item("dup")).await,
            Err(PortError::Remote(
                "duplicate key value violates unique constraint".into()
            ))
        );
        assert_eq!(
            adapter.create_item("tok", &new_item("silent")).await,
            Err(PortError::Remote(SAVE_FAILURE_FALLBACK.into()))
        );
    }

    #[tokio::test]
    async fn test_update_delete_and_generated() {
        let seen = Arc::new(Seen::default());
        let adapter = RestBackendAdapter::new(Client::new(), serve(seen.clone()).await, "anon");

        adapter
            .update_item(
                "tok",
                "row-1",
                &ItemPatch {
                    usage_count: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            adapter.delete_item("tok", "row-1").await,
            Err(PortError::Unauthorized)
        );
        adapter
            .create_generated(
                "tok",
                &NewRemoteGenerated {
                    user_id: "user-9".into(),
                    item_ids: vec!["row-1".into()],
                    draft_text: "post".into(),
                    platform: Platform::Linkedin,
                    is_final: true,
                },
            )
            .await
            .unwrap();

        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests[0].0, "patch:row-1");
        assert_eq!(requests[0].3, json!({"usage_count": 2}));
        assert_eq!(requests[1].0, "generated");
        assert_eq!(requests[1].3["platform"], "linkedin");
        assert_eq!(requests[1].3["is_final"], true);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let adapter = RestBackendAdapter::new(Client::new(), "http://127.0.0.1:9", "anon");
        assert!(matches!(
            adapter.create_item("tok", &new_item("x")).await,
            Err(PortError::Network(_))
        ));
    }
}
