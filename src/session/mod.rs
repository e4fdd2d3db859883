//! Authentication session and the resolved current user.

mod manager;

pub use manager::{last_known_authenticated, SessionManager};

use crate::gateway::GatewayError;
use crate::models::{AuthUser, Profile};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// The user the UI renders, either the persisted profile or the bare auth
/// user when no profile could be loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentUser {
    Profile(Profile),
    SessionUser(AuthUser),
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        match self {
            CurrentUser::Profile(p) => &p.id,
            CurrentUser::SessionUser(u) => &u.id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            CurrentUser::Profile(p) => p.email.as_deref(),
            CurrentUser::SessionUser(u) => u.email.as_deref(),
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, CurrentUser::Profile(_))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("email and password are required")]
    MissingCredentials,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
