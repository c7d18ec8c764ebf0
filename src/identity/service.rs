use std::sync::Arc;

use tracing::debug;

use super::gateway::AuthGateway;
use super::guard::{RoleRouteTable, LOGIN_PATH};
use super::state::AuthContext;
use super::store::SessionStore;
use crate::error::{ClientError, ClientResult, ErrorKind};

/// Login and logout flows as the UI drives them: gateway, then store, then state.
#[derive(Clone)]
pub struct AuthService {
    gateway: AuthGateway,
    ctx: Arc<AuthContext>,
    routes: RoleRouteTable,
}

impl AuthService {
    pub fn new(gateway: AuthGateway, ctx: Arc<AuthContext>, routes: RoleRouteTable) -> Self {
        Self { gateway, ctx, routes }
    }

    pub fn context(&self) -> &Arc<AuthContext> { &self.ctx }

    /// Submit the login form. On success returns the dashboard to navigate to.
    /// Every failure is recorded in the authorization state before it is returned.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<String> {
        if !self.ctx.begin_attempt() {
            debug!(target: "stockroom::auth", "overlapping login attempt; proceeding");
        }
        let result = self.try_login(email, password).await;
        if let Err(e) = &result {
            self.ctx.apply_failure(e.user_message());
        }
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> ClientResult<String> {
        let session = self.gateway.authenticate(email, password).await?;
        let Some(dashboard) = self.routes.dashboard_for(session.role()) else {
            return Err(ClientError::authorization(
                ErrorKind::UnknownRole,
                format!("no dashboard is configured for role {}", session.role()),
            ));
        };
        self.ctx
            .store()
            .save(&session)
            .map_err(|e| ClientError::storage(format!("{:#}", e)))?;
        self.ctx.apply_success(&session);
        Ok(dashboard.to_string())
    }

    /// Log out locally no matter what the backend says. Returns the login screen path.
    pub async fn logout(&self) -> String {
        match self.ctx.active_session() {
            Some(session) => self.gateway.end_session(&session).await,
            None => debug!(target: "stockroom::auth", "logout without an active session; clearing local state only"),
        }
        self.ctx.apply_logout();
        LOGIN_PATH.to_string()
    }

    /// Called when the user edits the form after a failed attempt.
    pub fn clear_error(&self) { self.ctx.clear_error(); }
}
