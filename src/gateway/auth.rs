//! Auth state change notifications.

use crate::models::Session;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Callback invoked with the event and the session that is current after it.
pub type AuthListener = Arc<dyn Fn(AuthChangeEvent, Option<&Session>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener registry shared by the gateway implementations.
#[derive(Default)]
pub struct AuthListeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, AuthListener)>>,
}

impl AuthListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: AuthListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) {
        self.lock().retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifies every listener. The registry lock is released before the
    /// callbacks run so a listener may register or remove listeners.
    pub fn notify(&self, event: AuthChangeEvent, session: Option<&Session>) {
        let listeners: Vec<AuthListener> =
            self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        debug!(?event, listeners = listeners.len(), "Dispatching auth state change");
        for listener in listeners {
            listener(event, session);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, AuthListener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}
