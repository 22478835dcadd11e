//! Current-user identity, derived from the auth service's session
//! stream.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use causerie_shared::types::User;
use causerie_shared::validation;
use causerie_shared::{AuthError, CauserieError};

use crate::auth::{
    AuthService, ProviderError, CODE_INVALID_CREDENTIAL, CODE_INVALID_EMAIL, CODE_USER_NOT_FOUND,
    CODE_WRONG_PASSWORD,
};

pub struct SessionManager<A: AuthService> {
    auth: Arc<A>,
    session: watch::Receiver<Option<User>>,
}

impl<A: AuthService> SessionManager<A> {
    pub fn new(auth: Arc<A>) -> Self {
        let session = auth.session_changes();
        Self { auth, session }
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.session.borrow().clone()
    }

    /// Change notification: delivers the current state immediately, then
    /// every sign-in/sign-out.
    pub fn watch(&self) -> watch::Receiver<Option<User>> {
        self.session.clone()
    }

    /// Validate locally, then ask the auth service for a session.
    ///
    /// Validation failures never reach the service; provider rejections
    /// are mapped onto [`AuthError`] categories. Never retried here.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, CauserieError> {
        validation::validate_login(email, password)?;

        match self.auth.sign_in(email, password).await {
            Ok(user) => {
                info!(user = %user.id, "Login succeeded");
                Ok(user)
            }
            Err(provider) => {
                warn!(code = %provider.code, "Login rejected by auth service");
                Err(map_provider_error(&provider).into())
            }
        }
    }

    /// Request session termination. Safe to call when already signed out.
    pub async fn logout(&self) {
        self.auth.sign_out().await;
    }
}

/// Map a provider error code onto a user-facing category.
fn map_provider_error(err: &ProviderError) -> AuthError {
    match err.code.as_str() {
        CODE_INVALID_EMAIL => AuthError::InvalidEmail,
        CODE_USER_NOT_FOUND | CODE_WRONG_PASSWORD | CODE_INVALID_CREDENTIAL => {
            AuthError::InvalidCredentials
        }
        other => AuthError::Unknown(other.to_string()),
    }
}
