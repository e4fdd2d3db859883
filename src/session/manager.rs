use super::{AuthState, CurrentUser, SessionError};
use crate::gateway::{decode, AuthChangeEvent, Backend, ListenerId, Query};
use crate::models::{AuthUser, PendingProfile, Profile, Session};
use crate::storage::{self, ClientStorage, AUTHENTICATED_FLAG_KEY, PENDING_PROFILE_KEY};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct SessionState {
    state: AuthState,
    session: Option<Session>,
    user: Option<CurrentUser>,
    last_error: Option<String>,
}

/// Owns the auth session and the resolved user.
///
/// State sits behind a lock shared with the auth-change listener, so the
/// manager itself is used through `&self` and can be shared by the stores.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn ClientStorage>,
    inner: Arc<RwLock<SessionState>>,
    listener: Mutex<Option<ListenerId>>,
}

/// Last-known authentication flag, readable without touching the backend.
pub fn last_known_authenticated(storage: &dyn ClientStorage) -> bool {
    matches!(storage.get(AUTHENTICATED_FLAG_KEY), Ok(Some(v)) if v == "true")
}

fn persist_flag(storage: &dyn ClientStorage, authenticated: bool) {
    let value = if authenticated { "true" } else { "false" };
    if let Err(e) = storage.set(AUTHENTICATED_FLAG_KEY, value) {
        warn!("Failed to persist authentication flag: {}", e);
    }
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            backend,
            storage,
            inner: Arc::new(RwLock::new(SessionState::default())),
            listener: Mutex::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Restores the current session, resolves the user and subscribes to
    /// session changes. Never fails; a backend error is kept in
    /// [`last_error`](Self::last_error).
    pub async fn initialize(&self) {
        self.write().state = AuthState::Authenticating;

        match self.backend.get_session().await {
            Ok(Some(session)) => {
                let user = self.resolve_user(&session.user).await;
                info!("Restored session for user {}", session.user.id);
                let mut state = self.write();
                state.session = Some(session);
                state.user = Some(user);
                state.state = AuthState::Authenticated;
                state.last_error = None;
            }
            Ok(None) => {
                debug!("No active session");
                let mut state = self.write();
                state.session = None;
                state.user = None;
                state.state = AuthState::Unauthenticated;
            }
            Err(e) => {
                error!("Failed to restore session: {}", e);
                let mut state = self.write();
                state.session = None;
                state.user = None;
                state.state = AuthState::Unauthenticated;
                state.last_error = Some(e.to_string());
            }
        }
        persist_flag(self.storage.as_ref(), self.is_authenticated());

        self.subscribe();
    }

    /// Persisted profile for the auth user, or the auth user itself when the
    /// profile is missing or cannot be read.
    async fn resolve_user(&self, auth_user: &AuthUser) -> CurrentUser {
        let query = Query::table("profiles").eq("id", auth_user.id.as_str());
        let rows = match self.backend.select(&query).await {
            Ok(rows) => rows,
            Err(e) if e.is_relation_missing() => {
                info!("Profiles table does not exist, using session user data");
                return CurrentUser::SessionUser(auth_user.clone());
            }
            Err(e) => {
                warn!("Error fetching user profile: {}", e);
                return CurrentUser::SessionUser(auth_user.clone());
            }
        };
        match decode::<Profile>(rows) {
            Ok(mut profiles) if !profiles.is_empty() => CurrentUser::Profile(profiles.remove(0)),
            Ok(_) => {
                info!("No profile found for user {}, using session data", auth_user.id);
                CurrentUser::SessionUser(auth_user.clone())
            }
            Err(e) => {
                warn!("Malformed profile row for user {}: {}", auth_user.id, e);
                CurrentUser::SessionUser(auth_user.clone())
            }
        }
    }

    /// Registers the auth-change listener once.
    fn subscribe(&self) {
        let mut listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if listener.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let storage = Arc::clone(&self.storage);
        let id = self
            .backend
            .on_auth_state_change(Arc::new(move |event, session| {
                debug!(?event, "Auth state changed");
                let mut state = inner.write().unwrap_or_else(|e| e.into_inner());
                match session {
                    Some(session) => {
                        let same_user = state
                            .user
                            .as_ref()
                            .is_some_and(|u| u.id() == session.user.id);
                        if !same_user {
                            state.user = Some(CurrentUser::SessionUser(session.user.clone()));
                        }
                        state.session = Some(session.clone());
                        state.state = AuthState::Authenticated;
                    }
                    None => {
                        if event == AuthChangeEvent::SignedOut {
                            info!("Session ended");
                        }
                        state.session = None;
                        state.user = None;
                        state.state = AuthState::Unauthenticated;
                    }
                }
                persist_flag(storage.as_ref(), state.session.is_some());
            }));
        *listener = Some(id);
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            let err = SessionError::MissingCredentials;
            self.write().last_error = Some(err.to_string());
            return Err(err);
        }

        {
            let mut state = self.write();
            state.state = AuthState::Authenticating;
            state.last_error = None;
        }

        match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!("Signed in as {}", session.user.id);
                let mut state = self.write();
                state.user = Some(CurrentUser::SessionUser(session.user.clone()));
                state.session = Some(session);
                state.state = AuthState::Authenticated;
                drop(state);
                persist_flag(self.storage.as_ref(), true);
                Ok(())
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                let mut state = self.write();
                state.state = if state.session.is_some() {
                    AuthState::Authenticated
                } else {
                    AuthState::Unauthenticated
                };
                state.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Creates the account without signing in. The optional name pair is
    /// staged in client storage for the first profile fetch after login.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        pending: Option<PendingProfile>,
    ) -> Result<AuthUser, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            let err = SessionError::MissingCredentials;
            self.write().last_error = Some(err.to_string());
            return Err(err);
        }
        self.write().last_error = None;

        match self.backend.sign_up(email, password).await {
            Ok(user) => {
                info!("Registered user {}", user.id);
                if let Some(pending) = pending {
                    if let Err(e) =
                        storage::write_json(self.storage.as_ref(), PENDING_PROFILE_KEY, &pending)
                    {
                        warn!("Failed to stage pending profile: {}", e);
                    }
                }
                Ok(user)
            }
            Err(e) => {
                warn!("Registration failed: {}", e);
                self.write().last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Signs out. State is only cleared when the backend accepts it.
    pub async fn logout(&self) -> Result<(), SessionError> {
        match self.backend.sign_out().await {
            Ok(()) => {
                let mut state = self.write();
                state.session = None;
                state.user = None;
                state.state = AuthState::Unauthenticated;
                state.last_error = None;
                drop(state);
                persist_flag(self.storage.as_ref(), false);
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!("Logout failed: {}", e);
                self.write().last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Removes the auth-change listener.
    pub fn teardown(&self) {
        let mut listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = listener.take() {
            self.backend.remove_auth_listener(id);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.read()
            .session
            .as_ref()
            .is_some_and(|s| !s.is_expired())
    }

    pub fn is_loading(&self) -> bool {
        self.read().state == AuthState::Authenticating
    }

    pub fn state(&self) -> AuthState {
        self.read().state
    }

    pub fn session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.read().user.clone()
    }

    /// Auth user of the live session.
    pub fn session_user(&self) -> Option<AuthUser> {
        self.read().session.as_ref().map(|s| s.user.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn storage(&self) -> Arc<dyn ClientStorage> {
        Arc::clone(&self.storage)
    }
}
