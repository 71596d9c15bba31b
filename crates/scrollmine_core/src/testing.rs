//! Test doubles shared by the unit test modules.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{AuthGrant, SavedItem, SessionUser};
use crate::ports::{
    BackendService, GenerationRequest, ItemPatch, NewRemoteGenerated, NewRemoteItem, PortError,
    PortResult, TextGenerationService,
};

pub(crate) use crate::extract::tests::StaticDocument;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BackendCall {
    SignIn(String),
    SignUp(String),
    CreateItem(NewRemoteItem),
    UpdateItem(String, ItemPatch),
    DeleteItem(String),
    CreateGenerated(NewRemoteGenerated),
}

/// Records every call; item creates whose title is in `failing_titles` fail.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    pub failing_titles: Mutex<HashSet<String>>,
    pub fail_generated: Mutex<bool>,
    pub reject_sign_in: Mutex<bool>,
    /// Sign-up answers without a session, as when email confirmation is on.
    pub confirm_sign_up: Mutex<bool>,
}

impl FakeBackend {
    pub(crate) fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn fail_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(title.to_string());
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn grant_for(email: &str) -> AuthGrant {
    AuthGrant {
        access_token: "remote-access".into(),
        refresh_token: Some("remote-refresh".into()),
        expires_in: 3600,
        user: SessionUser {
            id: "user-123".into(),
            email: Some(email.to_string()),
        },
    }
}

#[async_trait]
impl BackendService for FakeBackend {
    async fn sign_in(&self, email: &str, _password: &str) -> PortResult<AuthGrant> {
        self.record(BackendCall::SignIn(email.to_string()));
        if *self.reject_sign_in.lock().unwrap() {
            return Err(PortError::Remote("Invalid login credentials".into()));
        }
        Ok(grant_for(email))
    }

    async fn sign_up(&self, email: &str, _password: &str) -> PortResult<Option<AuthGrant>> {
        self.record(BackendCall::SignUp(email.to_string()));
        if *self.confirm_sign_up.lock().unwrap() {
            return Ok(None);
        }
        Ok(Some(grant_for(email)))
    }

    async fn create_item(&self, _access_token: &str, item: &NewRemoteItem) -> PortResult<SavedItem> {
        self.record(BackendCall::CreateItem(item.clone()));
        if self.failing_titles.lock().unwrap().contains(&item.title) {
            return Err(PortError::Remote("duplicate key value".into()));
        }
        Ok(SavedItem {
            id: uuid::Uuid::new_v4().to_string(),
            url: item.url.clone(),
            title: item.title.clone(),
            snippet: item.snippet.clone(),
            content: item.content.clone(),
            tags: item.tags.clone(),
            item_type: item.item_type,
            created_at: Utc::now(),
            is_favorite: item.is_favorite.unwrap_or(false),
            usage_count: item.usage_count.unwrap_or(0),
            last_used_at: item.last_used_at,
            migrated: false,
        })
    }

    async fn update_item(&self, _access_token: &str, id: &str, patch: &ItemPatch) -> PortResult<()> {
        self.record(BackendCall::UpdateItem(id.to_string(), patch.clone()));
        Ok(())
    }

    async fn delete_item(&self, _access_token: &str, id: &str) -> PortResult<()> {
        self.record(BackendCall::DeleteItem(id.to_string()));
        Ok(())
    }

    async fn create_generated(
        &self,
        _access_token: &str,
        content: &NewRemoteGenerated,
    ) -> PortResult<()> {
        self.record(BackendCall::CreateGenerated(content.clone()));
        if *self.fail_generated.lock().unwrap() {
            return Err(PortError::Network("connection reset".into()));
        }
        Ok(())
    }
}

/// Answers every prompt with `reply` (or fails with `error`) and keeps the prompts.
pub(crate) struct FakeGenerator {
    pub reply: Result<String, PortError>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: PortError) -> Self {
        Self {
            reply: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationService for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}
