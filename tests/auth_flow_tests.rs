//! End-to-end auth flows against an in-process backend: login, persisted session,
//! route guard, authenticated calls and forced logout on 401.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::tempdir;

use stockroom::api::ApiClient;
use stockroom::cli::{parse_command, Console};
use stockroom::config::parse_api_base;
use stockroom::error::ErrorKind;
use stockroom::identity::{
    AuthContext, AuthGateway, AuthService, FileSessionStore, MemorySessionStore, Role, RoleRouteTable, RouteGuard,
    Session, SessionStore, LOGIN_PATH, UNAUTHORIZED_PATH,
};

struct MockBackend {
    login_status: Mutex<u16>,
    login_body: Mutex<String>,
    login_calls: AtomicUsize,
    last_login: Mutex<Option<Value>>,
    logout_calls: AtomicUsize,
    product_calls: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            login_status: Mutex::new(200),
            login_body: Mutex::new(json!({"email": "a@b.com", "role": "MANAGER", "token": "t"}).to_string()),
            login_calls: AtomicUsize::new(0),
            last_login: Mutex::new(None),
            logout_calls: AtomicUsize::new(0),
            product_calls: AtomicUsize::new(0),
            last_authorization: Mutex::new(None),
        })
    }

    fn respond_login(&self, status: u16, body: &str) {
        *self.login_status.lock() = status;
        *self.login_body.lock() = body.to_string();
    }
}

async fn login(State(m): State<Arc<MockBackend>>, Json(body): Json<Value>) -> (StatusCode, String) {
    m.login_calls.fetch_add(1, Ordering::SeqCst);
    *m.last_login.lock() = Some(body);
    let status = StatusCode::from_u16(*m.login_status.lock()).unwrap();
    (status, m.login_body.lock().clone())
}

async fn logout(State(m): State<Arc<MockBackend>>) -> StatusCode {
    m.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn products(State(m): State<Arc<MockBackend>>, headers: HeaderMap) -> (StatusCode, String) {
    m.product_calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
    *m.last_authorization.lock() = auth.clone();
    if auth.as_deref() != Some("Basic t") {
        return (StatusCode::UNAUTHORIZED, String::new());
    }
    (StatusCode::OK, json!([{"id": 1, "name": "Hammer", "quantity": 4}]).to_string())
}

async fn expired() -> StatusCode { StatusCode::UNAUTHORIZED }

async fn admin_only() -> (StatusCode, String) {
    (StatusCode::FORBIDDEN, json!({"message": "Access is denied"}).to_string())
}

async fn no_content() -> StatusCode { StatusCode::NO_CONTENT }

async fn start_backend(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/manager/products", get(products))
        .route("/api/manager/expired", get(expired))
        .route("/api/admin/managers", get(admin_only))
        .route("/api/manager/deleteproduct", axum::routing::delete(no_content))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/api", addr)
}

// Nothing listens on the returned address.
fn dead_backend() -> String {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind 127.0.0.1:0");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}

struct Harness {
    ctx: Arc<AuthContext>,
    auth: AuthService,
    guard: RouteGuard,
    api: ApiClient,
}

fn harness(base: &str, store: Arc<dyn SessionStore>) -> Harness {
    let base = parse_api_base(base).unwrap();
    let timeout = Duration::from_secs(5);
    let ctx = Arc::new(AuthContext::initialize(store));
    let routes = RoleRouteTable::standard();
    let gateway = AuthGateway::new(base.clone(), timeout).unwrap();
    Harness {
        auth: AuthService::new(gateway, ctx.clone(), routes.clone()),
        guard: RouteGuard::new(ctx.clone(), routes),
        api: ApiClient::new(base, timeout, ctx.clone()).unwrap(),
        ctx,
    }
}

#[tokio::test]
async fn manager_login_persists_session_and_opens_dashboard() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let tmp = tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(tmp.path(), "k"));
    let h = harness(&base, store.clone());

    let dashboard = h.auth.login("a@b.com", "x").await.expect("login");
    assert_eq!(dashboard, "/manager/dashboard");

    let st = h.ctx.snapshot();
    assert!(st.is_authenticated());
    assert_eq!(st.role(), Some(Role::Manager));
    assert_eq!(st.user(), Some("a@b.com"));
    assert_eq!(st.error(), None);
    assert!(!st.loading());

    assert_eq!(store.load(), Session::new("a@b.com", Role::Manager, "t"));
    assert!(h.guard.can_access("/manager/dashboard", &[Role::Manager]));
    assert_eq!(mock.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*mock.last_login.lock(), Some(json!({"email": "a@b.com", "password": "x"})));

    // a fresh process over the same directory picks the session back up
    let restored = AuthContext::initialize(Arc::new(FileSessionStore::new(tmp.path(), "k")));
    assert_eq!(restored.snapshot().role(), Some(Role::Manager));
}

#[tokio::test]
async fn invalid_email_fails_before_any_request() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));

    let err = h.auth.login("bad", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEmailFormat);
    let err = h.auth.login("a@b.com", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingField);
    assert_eq!(mock.login_calls.load(Ordering::SeqCst), 0);

    let st = h.ctx.snapshot();
    assert!(!st.is_authenticated());
    assert!(st.error().is_some());
    assert!(!st.loading());

    h.auth.clear_error();
    assert_eq!(h.ctx.snapshot().error(), None);
}

#[tokio::test]
async fn empty_success_body_is_a_protocol_error() {
    let mock = MockBackend::new();
    mock.respond_login(200, "{}");
    let base = start_backend(mock.clone()).await;
    let store = Arc::new(MemorySessionStore::new());
    let h = harness(&base, store.clone());

    let err = h.auth.login("a@b.com", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(!h.ctx.snapshot().is_authenticated());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn rejected_credentials_keep_an_existing_login() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    h.auth.login("a@b.com", "x").await.unwrap();

    mock.respond_login(401, &json!({"message": "Bad credentials"}).to_string());
    let err = h.auth.login("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

    let st = h.ctx.snapshot();
    assert!(st.is_authenticated());
    assert_eq!(st.role(), Some(Role::Manager));
    assert_eq!(st.error(), Some("Bad credentials"));
}

#[tokio::test]
async fn unknown_role_is_denied_not_defaulted() {
    let mock = MockBackend::new();
    mock.respond_login(200, &json!({"email": "a@b.com", "role": "SUPERVISOR", "token": "t"}).to_string());
    let base = start_backend(mock.clone()).await;
    let store = Arc::new(MemorySessionStore::new());
    let h = harness(&base, store.clone());

    let err = h.auth.login("a@b.com", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownRole);
    assert_eq!(err.redirect_target(), Some(UNAUTHORIZED_PATH));
    assert!(!h.ctx.snapshot().is_authenticated());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn failed_console_login_stays_on_the_form() {
    let mock = MockBackend::new();
    mock.respond_login(200, &json!({"email": "a@b.com", "role": "SUPERVISOR", "token": "t"}).to_string());
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    let mut console = Console::new(h.auth, h.guard, h.api);

    let out = console.execute(parse_command("login a@b.com x").unwrap()).await.unwrap();
    assert!(out.starts_with("error:"), "{}", out);
    assert!(!out.contains('→'), "{}", out);
    assert_eq!(console.screen(), LOGIN_PATH);
    assert!(h.ctx.snapshot().error().is_some());
}

#[tokio::test]
async fn unreachable_backend_is_a_connectivity_error() {
    let h = harness(&dead_backend(), Arc::new(MemorySessionStore::new()));
    let err = h.auth.login("a@b.com", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unreachable);
    assert!(err.is_retryable());
    assert!(h.ctx.snapshot().error().unwrap().contains("try again later"));
}

#[tokio::test]
async fn api_calls_carry_the_stored_token() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    h.auth.login("a@b.com", "x").await.unwrap();

    let v = h.api.get("/manager/products").await.expect("products");
    assert_eq!(v[0]["name"], "Hammer");
    assert_eq!(mock.last_authorization.lock().as_deref(), Some("Basic t"));

    assert_eq!(h.api.delete("manager/deleteproduct").await.unwrap(), Value::Null);
}

#[tokio::test]
async fn record_replaced_by_another_user_is_not_used() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let tmp = tempdir().unwrap();
    let h = harness(&base, Arc::new(FileSessionStore::new(tmp.path(), "k")));
    h.auth.login("a@b.com", "x").await.unwrap();

    // a second process sharing the directory signs in as someone else
    let other = FileSessionStore::new(tmp.path(), "k");
    let admin = Session::new("root@b.com", Role::Admin, "admintoken").unwrap();
    other.save(&admin).unwrap();

    let err = h.api.get("/manager/products").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
    assert_eq!(mock.product_calls.load(Ordering::SeqCst), 0);
    assert!(!h.ctx.snapshot().is_authenticated());
    assert_eq!(other.load(), Some(admin));
}

#[tokio::test]
async fn api_call_outside_the_api_root_sends_nothing() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    h.auth.login("a@b.com", "x").await.unwrap();

    let err = h.api.get("http://evil.example/manager/products").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    let err = h.api.get("/../api2/manager/products").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert_eq!(mock.product_calls.load(Ordering::SeqCst), 0);
    assert!(h.ctx.snapshot().is_authenticated());
}

#[tokio::test]
async fn api_call_without_session_sends_nothing() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));

    let err = h.api.get("/manager/products").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
    assert_eq!(err.redirect_target(), Some(LOGIN_PATH));
    assert_eq!(mock.product_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn any_401_forces_logout() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let store = Arc::new(MemorySessionStore::new());
    let h = harness(&base, store.clone());
    h.auth.login("a@b.com", "x").await.unwrap();
    assert!(h.ctx.snapshot().is_authenticated());

    let err = h.api.get("/manager/expired").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionRejected);
    assert_eq!(err.redirect_target(), Some(LOGIN_PATH));
    assert!(!h.ctx.snapshot().is_authenticated());
    assert_eq!(h.ctx.snapshot().role(), None);
    assert!(store.load().is_none());
}

#[tokio::test]
async fn forbidden_call_keeps_the_session() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    h.auth.login("a@b.com", "x").await.unwrap();

    let err = h.api.get("/admin/managers").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientRole);
    assert!(h.ctx.snapshot().is_authenticated());
}

#[tokio::test]
async fn logout_notifies_backend_and_clears_locally() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let store = Arc::new(MemorySessionStore::new());
    let h = harness(&base, store.clone());
    h.auth.login("a@b.com", "x").await.unwrap();

    assert_eq!(h.auth.logout().await, LOGIN_PATH);
    assert_eq!(mock.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!h.ctx.snapshot().is_authenticated());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn logout_succeeds_locally_when_backend_is_down() {
    let store = Arc::new(MemorySessionStore::new());
    store.save(&Session::new("a@b.com", Role::Admin, "t").unwrap()).unwrap();
    let h = harness(&dead_backend(), store.clone());
    assert!(h.ctx.snapshot().is_authenticated());

    assert_eq!(h.auth.logout().await, LOGIN_PATH);
    assert!(!h.ctx.snapshot().is_authenticated());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn console_routes_through_guard_and_redirects_on_401() {
    let mock = MockBackend::new();
    let base = start_backend(mock.clone()).await;
    let h = harness(&base, Arc::new(MemorySessionStore::new()));
    let mut console = Console::new(h.auth, h.guard, h.api);
    assert_eq!(console.screen(), LOGIN_PATH);

    let out = console.execute(parse_command("login a@b.com x").unwrap()).await.unwrap();
    assert!(out.contains("MANAGER"), "{}", out);
    assert_eq!(console.screen(), "/manager/dashboard");

    console.execute(parse_command("open /admin/dashboard").unwrap()).await.unwrap();
    assert_eq!(console.screen(), UNAUTHORIZED_PATH);

    let out = console.execute(parse_command("get /manager/products").unwrap()).await.unwrap();
    assert!(out.contains("Hammer"));

    let out = console.execute(parse_command("get /manager/expired").unwrap()).await.unwrap();
    assert!(out.contains("sign in again"), "{}", out);
    assert_eq!(console.screen(), LOGIN_PATH);
    assert!(!h.ctx.snapshot().is_authenticated());

    assert!(console.execute(parse_command("quit").unwrap()).await.is_none());
}
