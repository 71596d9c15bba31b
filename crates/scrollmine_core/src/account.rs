//! crates/scrollmine_core/src/account.rs
//!
//! Sign-in, sign-up and sign-out. Whenever one of them yields a session it is
//! stored and, when the device holds local data, handed to the migrator once.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::domain::{AuthGrant, Session};
use crate::migrator::{MigrationReport, Migrator};
use crate::ports::{BackendService, KeyValueStore, PortError, PortResult};
use crate::ready::Readiness;
use crate::session::SessionStore;
use crate::store::keys;

#[derive(Debug, Clone, PartialEq)]
pub struct SignInOutcome {
    pub session: Session,
    /// Present when local data was found and a migration pass ran.
    pub migration: Option<MigrationReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(SignInOutcome),
    /// The account exists but the backend wants the email confirmed first.
    ConfirmationPending { email: String },
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn KeyValueStore>,
    sessions: SessionStore,
    backend: Arc<dyn BackendService>,
    migrator: Migrator,
    readiness: Readiness,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        sessions: SessionStore,
        backend: Arc<dyn BackendService>,
        migrator: Migrator,
    ) -> Self {
        Self {
            store,
            sessions,
            backend,
            migrator,
            readiness: Readiness::new(),
        }
    }

    /// Loads (and prunes) the stored session, then signals readiness.
    pub async fn initialize(&self) -> PortResult<Option<Session>> {
        let session = self.sessions.get_session().await;
        self.readiness.mark_ready();
        session
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    pub async fn current_session(&self) -> PortResult<Option<Session>> {
        self.sessions.get_session().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> PortResult<SignInOutcome> {
        let (email, password) = credentials(email, password)?;
        let grant = self.backend.sign_in(email, password).await?;
        self.establish(grant).await
    }

    /// Registers an account. Local data migrates only when a session comes back
    /// right away; otherwise it stays local until the first sign-in.
    pub async fn sign_up(&self, email: &str, password: &str) -> PortResult<SignUpOutcome> {
        let (email, password) = credentials(email, password)?;
        match self.backend.sign_up(email, password).await? {
            Some(grant) => Ok(SignUpOutcome::SignedIn(self.establish(grant).await?)),
            None => {
                info!("Account created for {}; waiting for email confirmation", email);
                Ok(SignUpOutcome::ConfirmationPending {
                    email: email.to_string(),
                })
            }
        }
    }

    async fn establish(&self, grant: AuthGrant) -> PortResult<SignInOutcome> {
        let session = Session::from_grant(grant, Utc::now());
        self.sessions.set_session(&session).await?;
        info!("Signed in as user {}", session.user.id);

        let migration = match self.migrator.has_local_data().await {
            Ok(true) => match self.migrator.migrate(&session.user.id).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("Migration error: {}", e);
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                error!("Could not inspect local data for migration: {}", e);
                None
            }
        };

        Ok(SignInOutcome { session, migration })
    }

    /// Drops the session and any token the dashboard handed over.
    pub async fn sign_out(&self) -> PortResult<()> {
        self.sessions.clear_session().await?;
        self.store.remove(keys::AUTH_TOKEN).await?;
        info!("Signed out");
        Ok(())
    }
}

fn credentials<'a>(email: &'a str, password: &'a str) -> PortResult<(&'a str, &'a str)> {
    let email = email.trim();
    let password = password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(PortError::Invalid(
            "Please enter both email and password".to_string(),
        ));
    }
    Ok((email, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemType, SavedItemInput};
    use crate::library::LocalLibrary;
    use crate::store::MemoryStore;
    use crate::testing::{BackendCall, FakeBackend};
    use serde_json::json;

    struct Harness {
        account: AccountService,
        library: LocalLibrary,
        store: Arc<MemoryStore>,
        backend: Arc<FakeBackend>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend::default());
        let sessions = SessionStore::new(store.clone());
        let library = LocalLibrary::new(store.clone());
        let migrator = Migrator::new(sessions.clone(), library.clone(), backend.clone());
        Harness {
            account: AccountService::new(store.clone(), sessions, backend.clone(), migrator),
            library,
            store,
            backend,
        }
    }

    #[tokio::test]
    async fn test_sign_in_stores_live_session() {
        let h = harness();
        let outcome = h.account.sign_in(" reader@example.com ", "secret").await.unwrap();

        assert_eq!(outcome.session.user.id, "user-123");
        assert!(outcome.session.is_live_at(Utc::now()));
        assert_eq!(outcome.migration, None);
        assert_eq!(
            h.account.current_session().await.unwrap(),
            Some(outcome.session)
        );
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::SignIn("reader@example.com".into())]
        );
    }

    #[tokio::test]
    async fn test_sign_in_migrates_local_data_once() {
        let h = harness();
        h.library
            .insert_item(
                SavedItemInput {
                    url: "https://example.com".into(),
                    title: "local".into(),
                    snippet: None,
                    content: None,
                    tags: vec![],
                    item_type: ItemType::Article,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let outcome = h.account.sign_in("reader@example.com", "secret").await.unwrap();
        assert_eq!(outcome.migration.unwrap().items_migrated, 1);
        assert!(h.library.is_empty().await.unwrap());

        h.account.sign_out().await.unwrap();
        let again = h.account.sign_in("reader@example.com", "secret").await.unwrap();
        assert_eq!(again.migration, None);
    }

    #[tokio::test]
    async fn test_sign_up_with_immediate_session_migrates() {
        let h = harness();
        h.library
            .insert_item(
                SavedItemInput {
                    url: "https://example.com/before-signup".into(),
                    title: "kept from guest mode".into(),
                    snippet: None,
                    content: None,
                    tags: vec![],
                    item_type: ItemType::Tweet,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let outcome = h.account.sign_up("new@example.com ", "secret").await.unwrap();

        let SignUpOutcome::SignedIn(signed_in) = outcome else {
            panic!("expected a session from sign-up");
        };
        assert_eq!(signed_in.migration.unwrap().items_migrated, 1);
        assert!(h.library.is_empty().await.unwrap());
        assert_eq!(
            h.account.current_session().await.unwrap(),
            Some(signed_in.session)
        );
        assert_eq!(h.backend.calls()[0], BackendCall::SignUp("new@example.com".into()));
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_keeps_local_data() {
        let h = harness();
        *h.backend.confirm_sign_up.lock().unwrap() = true;
        h.library
            .insert_item(
                SavedItemInput {
                    url: "https://example.com".into(),
                    title: "still local".into(),
                    snippet: None,
                    content: None,
                    tags: vec![],
                    item_type: ItemType::Article,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let outcome = h.account.sign_up("new@example.com", "secret").await.unwrap();

        assert_eq!(
            outcome,
            SignUpOutcome::ConfirmationPending {
                email: "new@example.com".into()
            }
        );
        assert_eq!(h.account.current_session().await.unwrap(), None);
        assert!(!h.library.is_empty().await.unwrap());
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::SignUp("new@example.com".into())]
        );
    }

    #[tokio::test]
    async fn test_rejected_credentials_leave_no_session() {
        let h = harness();
        *h.backend.reject_sign_in.lock().unwrap() = true;

        let result = h.account.sign_in("reader@example.com", "wrong").await;

        assert_eq!(
            result,
            Err(PortError::Remote("Invalid login credentials".into()))
        );
        assert_eq!(h.account.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_credentials_are_rejected_locally() {
        let h = harness();
        assert!(matches!(
            h.account.sign_in("", "secret").await,
            Err(PortError::Invalid(_))
        ));
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_and_token() {
        let h = harness();
        h.account.sign_in("reader@example.com", "secret").await.unwrap();
        h.store.set(keys::AUTH_TOKEN, json!("dash-token")).await.unwrap();

        h.account.sign_out().await.unwrap();

        assert_eq!(h.account.current_session().await.unwrap(), None);
        assert_eq!(h.store.get(keys::AUTH_TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_initialize_marks_ready() {
        let h = harness();
        assert!(!h.account.readiness().is_ready());
        assert_eq!(h.account.initialize().await.unwrap(), None);
        assert!(h.account.readiness().is_ready());
    }
}
