use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::role::Role;
use super::session::Session;
use super::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub role: Role,
}

/// What the rest of the app reads to decide what to render. User and role live
/// together in `identity`, so "authenticated without a role" is unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationState {
    identity: Option<Identity>,
    error: Option<String>,
    loading: bool,
}

impl AuthorizationState {
    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }
    pub fn role(&self) -> Option<Role> { self.identity.as_ref().map(|i| i.role) }
    pub fn user(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.user.as_str()) }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn loading(&self) -> bool { self.loading }
}

/// Process-wide authorization state plus the store it is derived from.
/// Create one with [`AuthContext::initialize`] at startup and share it behind an `Arc`;
/// all mutation goes through the transition methods below.
pub struct AuthContext {
    state: RwLock<AuthorizationState>,
    store: Arc<dyn SessionStore>,
}

impl AuthContext {
    /// Restore state from the store. A missing or corrupt record yields an anonymous state.
    pub fn initialize(store: Arc<dyn SessionStore>) -> Self {
        let identity = store.load().map(|s| Identity { user: s.email().to_string(), role: s.role() });
        match &identity {
            Some(id) => info!(target: "stockroom::auth", "restored session user={} role={}", id.user, id.role),
            None => info!(target: "stockroom::auth", "no stored session; starting anonymous"),
        }
        Self {
            state: RwLock::new(AuthorizationState { identity, error: None, loading: false }),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> { &self.store }

    pub fn snapshot(&self) -> AuthorizationState { self.state.read().clone() }

    /// The stored session, provided it still belongs to the identity held here.
    /// A record that disappeared or now names another user drops the local identity
    /// and leaves the record alone.
    pub fn active_session(&self) -> Option<Session> {
        let identity = self.state.read().identity.clone()?;
        match self.store.load() {
            Some(s) if s.email() == identity.user && s.role() == identity.role => Some(s),
            other => {
                warn!(
                    target: "stockroom::auth",
                    "stored session no longer matches user={} role={} (found {}); signing out locally",
                    identity.user,
                    identity.role,
                    other.as_ref().map(|s| format!("{} {}", s.email(), s.role())).unwrap_or_else(|| "nothing".into())
                );
                let mut st = self.state.write();
                if st.identity.as_ref() == Some(&identity) {
                    *st = AuthorizationState::default();
                }
                None
            }
        }
    }

    /// Mark an authentication attempt as in flight. Returns false if one already is.
    pub fn begin_attempt(&self) -> bool {
        let mut st = self.state.write();
        if st.loading { return false; }
        st.loading = true;
        true
    }

    pub fn apply_success(&self, session: &Session) {
        let mut st = self.state.write();
        st.identity = Some(Identity { user: session.email().to_string(), role: session.role() });
        st.error = None;
        st.loading = false;
    }

    /// Record a failed attempt. An already authenticated user stays authenticated.
    pub fn apply_failure(&self, message: impl Into<String>) {
        let mut st = self.state.write();
        st.error = Some(message.into());
        st.loading = false;
    }

    pub fn apply_logout(&self) {
        {
            let mut st = self.state.write();
            *st = AuthorizationState::default();
        }
        if let Err(e) = self.store.clear() {
            warn!(target: "stockroom::auth", "failed to clear stored session: {:#}", e);
        }
        info!(target: "stockroom::auth", "logged out");
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }
}
