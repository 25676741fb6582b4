//! Process-wide session state, readable by any consumer and replaced as a
//! whole on every change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::api::Gateway;
use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Unknown,
    Checking,
    Authenticated,
    Unauthenticated,
}

/// Profile fields the UI shows for the signed-in user. The default value is
/// the empty profile used while signed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub bio: String,
}

impl SessionUser {
    pub fn is_empty(&self) -> bool {
        self == &SessionUser::default()
    }
}

impl From<&UserProfile> for SessionUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            image_url: profile.image_url.clone(),
            bio: profile.bio.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub status: AuthStatus,
    pub user: SessionUser,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.status == AuthStatus::Checking
    }

    fn signed_out() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: SessionUser::default(),
        }
    }
}

#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
    latest_check: Arc<AtomicU64>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(state),
            latest_check: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ask the backend who is signed in and record the answer.
    ///
    /// Any failure counts as signed out. When checks overlap, only the most
    /// recently started one may write its result; a superseded check returns
    /// whatever the published state says.
    pub async fn check_auth_user(&self, gateway: &Gateway) -> bool {
        let ticket = self.latest_check.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.status = AuthStatus::Checking);

        let next = match gateway.get_current_user().await {
            Some(current) => SessionState {
                status: AuthStatus::Authenticated,
                user: SessionUser::from(&current.profile),
            },
            None => SessionState::signed_out(),
        };
        if self.latest_check.load(Ordering::SeqCst) == ticket {
            tracing::debug!("Session check {} resolved to {:?}", ticket, next.status);
            let authenticated = next.is_authenticated();
            self.state.send_replace(next);
            authenticated
        } else {
            // A newer check or a sign-out owns the state now; answer with it.
            tracing::debug!("Discarding superseded session check {}", ticket);
            self.is_authenticated()
        }
    }

    pub fn sign_out_reset(&self) {
        // Also supersedes any check still in flight.
        self.latest_check.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::signed_out());
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn user(&self) -> SessionUser {
        self.state.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn changes(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.subscribe())
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
