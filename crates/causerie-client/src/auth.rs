//! Auth service contract and an in-process backend for development.
//!
//! The session stream is a `watch` channel: new subscribers observe the
//! current session immediately, then every sign-in/sign-out.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use causerie_shared::types::{User, UserId};

/// Provider error codes, `auth/<reason>` by convention.
pub const CODE_INVALID_EMAIL: &str = "auth/invalid-email";
pub const CODE_USER_NOT_FOUND: &str = "auth/user-not-found";
pub const CODE_WRONG_PASSWORD: &str = "auth/wrong-password";
pub const CODE_INVALID_CREDENTIAL: &str = "auth/invalid-credential";

/// Raw rejection from the auth provider; the session manager maps the
/// code onto a user-facing category.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Credential verification and session issuance.
pub trait AuthService: Send + Sync + 'static {
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, ProviderError>> + Send;

    /// Terminate the session. Idempotent.
    fn sign_out(&self) -> impl Future<Output = ()> + Send;

    /// Session stream: current state immediately, then every change.
    fn session_changes(&self) -> watch::Receiver<Option<User>>;
}

/// In-process auth backend with a fixed account registry.
pub struct LocalAuth {
    accounts: HashMap<String, Account>,
    session: watch::Sender<Option<User>>,
}

struct Account {
    password: String,
    user: User,
}

impl LocalAuth {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: HashMap::new(),
            session,
        }
    }

    /// Add an account to the registry. Accounts are fixed once the
    /// service is shared.
    pub fn with_account(mut self, email: &str, password: &str, display_name: &str) -> Self {
        let user = User {
            id: UserId::new(Uuid::new_v4().simple().to_string()),
            display_name: Some(display_name.to_string()),
        };
        self.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        self
    }
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthService for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, ProviderError> {
        let account = self.accounts.get(email).ok_or_else(|| {
            warn!(email = %email, "Unknown account");
            ProviderError::new(CODE_USER_NOT_FOUND, format!("no account for {email}"))
        })?;

        if account.password != password {
            warn!(email = %email, "Wrong password");
            return Err(ProviderError::new(CODE_WRONG_PASSWORD, "wrong password"));
        }

        self.session.send_replace(Some(account.user.clone()));
        info!(user = %account.user.id, "Signed in");
        Ok(account.user.clone())
    }

    async fn sign_out(&self) {
        if self.session.send_replace(None).is_some() {
            info!("Signed out");
        }
    }

    fn session_changes(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
    }
}
