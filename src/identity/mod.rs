//! Client-side identity: the persisted session, the login gateway, the derived
//! authorization state and the route guard that reads it.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod session;
mod store;
mod gateway;
mod state;
mod guard;
mod service;

pub use role::{Role, UnknownRole};
pub use session::Session;
pub use store::{SessionStore, FileSessionStore, MemorySessionStore, DEFAULT_SESSION_KEY};
pub use gateway::{AuthGateway, validate_credentials, basic_credential, classify_login_response};
pub(crate) use gateway::backend_message;
pub use state::{AuthContext, AuthorizationState, Identity};
pub use guard::{RouteGuard, RoleRouteTable, Navigation, HOME_PATH, LOGIN_PATH, UNAUTHORIZED_PATH};
pub use service::AuthService;
