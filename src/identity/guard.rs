use std::sync::Arc;

use tracing::debug;

use super::role::Role;
use super::state::AuthContext;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

const PUBLIC_PATHS: [&str; 3] = [HOME_PATH, LOGIN_PATH, UNAUTHORIZED_PATH];

/// Canonical dashboard per role. A role without an entry has no permitted screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRouteTable {
    entries: Vec<(Role, String)>,
}

impl Default for RoleRouteTable {
    fn default() -> Self { Self::standard() }
}

impl RoleRouteTable {
    pub fn standard() -> Self {
        Self {
            entries: vec![
                (Role::Admin, "/admin/dashboard".to_string()),
                (Role::Manager, "/manager/dashboard".to_string()),
                (Role::Employee, "/employee/dashboard".to_string()),
            ],
        }
    }

    /// Build a table from explicit entries; a later entry for the same role replaces the earlier one.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        let mut out: Vec<(Role, String)> = Vec::new();
        for (role, path) in entries {
            let path = path.into();
            match out.iter_mut().find(|(r, _)| *r == role) {
                Some(slot) => slot.1 = path,
                None => out.push((role, path)),
            }
        }
        Self { entries: out }
    }

    pub fn dashboard_for(&self, role: Role) -> Option<&str> {
        self.entries.iter().find(|(r, _)| *r == role).map(|(_, p)| p.as_str())
    }

    /// Roles whose dashboard is `path`; empty for paths the table does not know.
    pub fn roles_for(&self, path: &str) -> Vec<Role> {
        let path = normalize(path);
        self.entries.iter().filter(|(_, p)| p == path).map(|(r, _)| *r).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(String),
    Redirect(String),
}

impl Navigation {
    /// The screen that ends up on display.
    pub fn path(&self) -> &str {
        match self {
            Navigation::Render(p) | Navigation::Redirect(p) => p,
        }
    }
}

/// Drops any query or fragment and trailing slashes; otherwise paths match exactly, case included.
fn normalize(path: &str) -> &str {
    let p = path.trim();
    let p = p.split(['?', '#']).next().unwrap_or(p);
    if p.len() > 1 { p.trim_end_matches('/') } else { p }
}

/// Gates role-restricted screens. Denial is a routing decision only; the guard
/// never changes authorization state.
#[derive(Clone)]
pub struct RouteGuard {
    ctx: Arc<AuthContext>,
    routes: RoleRouteTable,
}

impl RouteGuard {
    pub fn new(ctx: Arc<AuthContext>, routes: RoleRouteTable) -> Self { Self { ctx, routes } }

    pub fn routes(&self) -> &RoleRouteTable { &self.routes }

    /// True iff there is a role, it is allowed here, and the route table knows it.
    /// "No session" and "wrong role" are deliberately indistinguishable.
    pub fn can_access(&self, path: &str, allowed_roles: &[Role]) -> bool {
        let Some(role) = self.ctx.snapshot().role() else {
            debug!(target: "stockroom::guard", "deny path={} reason=anonymous", path);
            return false;
        };
        if self.routes.dashboard_for(role).is_none() {
            debug!(target: "stockroom::guard", "deny path={} role={} reason=role_not_routed", path, role);
            return false;
        }
        let ok = allowed_roles.contains(&role);
        if !ok {
            debug!(target: "stockroom::guard", "deny path={} role={} reason=role_not_allowed", path, role);
        }
        ok
    }

    pub fn navigate(&self, path: &str) -> Navigation {
        let p = normalize(path);
        if PUBLIC_PATHS.contains(&p) {
            return Navigation::Render(p.to_string());
        }
        let allowed = self.routes.roles_for(p);
        // unknown paths fall through to the unauthorized screen
        if !allowed.is_empty() && self.can_access(p, &allowed) {
            Navigation::Render(p.to_string())
        } else {
            Navigation::Redirect(UNAUTHORIZED_PATH.to_string())
        }
    }
}
