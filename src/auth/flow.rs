//! Sign-up, sign-in and sign-out orchestration. Each step runs only after the
//! previous one succeeded.

use super::context::SessionUser;
use super::guard::Route;
use super::validation::{SigninForm, SignupForm, ValidationErrors};
use crate::error::{AppError, AppResult};
use crate::models::Credentials;
use crate::state::AppState;

const ACCOUNT_EXISTS: &str = "A user with the same id, email, or phone already exists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user: SessionUser,
    pub redirect: Route,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Invalid form: {0}")]
    Validation(ValidationErrors),

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("The account was created but no session could be started")]
    SessionFailed,

    #[error("The session could not be verified")]
    NotAuthenticated,

    #[error("{0}")]
    Backend(String),
}

impl From<AppError> for AuthFailure {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(errors) => AuthFailure::Validation(errors),
            AppError::Backend(e) if e.message.contains(ACCOUNT_EXISTS) => AuthFailure::AccountExists,
            other => AuthFailure::Backend(other.user_message()),
        }
    }
}

impl From<ValidationErrors> for AuthFailure {
    fn from(errors: ValidationErrors) -> Self {
        AuthFailure::Validation(errors)
    }
}

/// User-facing message for a failed flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub link: Option<Route>,
}

impl AuthFailure {
    pub fn notice(&self) -> Notice {
        let (title, description, link) = match self {
            AuthFailure::Validation(errors) => ("Invalid form", errors.to_string(), None),
            AuthFailure::AccountExists => (
                "Sign-up failed",
                "A user with this email already exists. Please sign in or use a different email."
                    .to_string(),
                Some(Route::SignIn),
            ),
            AuthFailure::SessionFailed => (
                "Sign-in failed",
                "Please try signing in manually".to_string(),
                Some(Route::SignIn),
            ),
            AuthFailure::NotAuthenticated => {
                ("Authentication failed", "Please try again".to_string(), None)
            }
            AuthFailure::Backend(message) if message.is_empty() => {
                ("Error", "An unexpected error occurred".to_string(), None)
            }
            AuthFailure::Backend(message) => ("Error", message.clone(), None),
        };
        Notice {
            title: title.to_string(),
            description,
            link,
        }
    }
}

pub struct AuthFlow<'a> {
    state: &'a AppState,
}

impl<'a> AuthFlow<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create the account and profile, then sign in as the new user.
    pub async fn sign_up(&self, form: &SignupForm) -> Result<SignedIn, AuthFailure> {
        let user = form.validate()?;
        let profile = self.state.gateway.create_user_account(&user).await?;
        tracing::info!("Signed up {} as profile {}", user.email, profile.id);

        self.replace_session().await?;
        let credentials = Credentials {
            email: user.email,
            password: user.password,
        };
        if let Err(e) = self.state.gateway.sign_in_account(&credentials).await {
            tracing::warn!("Automatic sign-in after sign-up failed: {}", e);
            return Err(AuthFailure::SessionFailed);
        }
        self.confirm().await
    }

    pub async fn sign_in(&self, form: &SigninForm) -> Result<SignedIn, AuthFailure> {
        let credentials = form.validate()?;
        self.replace_session().await?;
        self.state.gateway.sign_in_account(&credentials).await?;
        self.confirm().await
    }

    /// End the session and forget everything cached for it. `Ok(None)` when
    /// no session existed.
    pub async fn sign_out(&self) -> AppResult<Option<()>> {
        let result = self.state.gateway.sign_out_account().await?;
        self.state.session.sign_out_reset();
        self.state.cache.clear();
        Ok(result)
    }

    async fn replace_session(&self) -> Result<(), AuthFailure> {
        match self.state.gateway.sign_out_account().await? {
            Some(()) => tracing::info!("Signed out existing session"),
            None => tracing::debug!("No existing session to sign out"),
        }
        self.state.cache.clear();
        Ok(())
    }

    async fn confirm(&self) -> Result<SignedIn, AuthFailure> {
        if !self.state.check_auth_user().await {
            return Err(AuthFailure::NotAuthenticated);
        }
        Ok(SignedIn {
            user: self.state.session.user(),
            redirect: Route::Home,
        })
    }
}
