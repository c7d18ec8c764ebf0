use std::time::Duration;

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::role::Role;
use super::session::Session;
use crate::config::api_url;
use crate::error::{ClientError, ClientResult, ErrorKind};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// Client-side checks run before any request is made.
pub fn validate_credentials(email: &str, password: &str) -> ClientResult<()> {
    if email.trim().is_empty() {
        return Err(ClientError::missing_field("email"));
    }
    if password.is_empty() {
        return Err(ClientError::missing_field("password"));
    }
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(ClientError::invalid_email());
    }
    Ok(())
}

/// `base64(email:password)`, the credential the backend's Basic scheme expects.
pub fn basic_credential(email: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", email, password))
}

/// Pull the backend's human readable `message` out of an error body, if it sent one.
pub(crate) fn backend_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("message").and_then(|m| m.as_str()).map(str::trim).filter(|m| !m.is_empty()).map(str::to_string)
}

fn non_empty_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str()).map(str::trim).filter(|s| !s.is_empty())
}

/// Turn a login response into a session or a classified error. This is the only
/// place login failures are told apart.
pub fn classify_login_response(status: u16, body: &str, email: &str, password: &str) -> ClientResult<Session> {
    if status == 401 || status == 403 {
        return Err(ClientError::invalid_credentials(backend_message(body)));
    }
    if !(200..300).contains(&status) {
        return Err(ClientError::unexpected_status(status, backend_message(body)));
    }
    let v: Value = serde_json::from_str(body).map_err(|e| ClientError::malformed(format!("login response is not JSON: {}", e)))?;
    let Some(obj) = v.as_object() else {
        return Err(ClientError::malformed("login response is not a JSON object"));
    };
    let resp_email = non_empty_str(obj, "email").ok_or_else(|| ClientError::malformed("login response is missing 'email'"))?;
    let raw_role = non_empty_str(obj, "role").ok_or_else(|| ClientError::malformed("login response is missing 'role'"))?;
    let role: Role = raw_role
        .parse()
        .map_err(|e| ClientError::authorization(ErrorKind::UnknownRole, format!("backend returned {}", e)))?;
    let token = non_empty_str(obj, "token")
        .or_else(|| non_empty_str(obj, "credentialToken"))
        .map(str::to_string)
        .unwrap_or_else(|| basic_credential(email.trim(), password));
    Session::new(resp_email, role, token).ok_or_else(|| ClientError::malformed("login response produced an incomplete session"))
}

/// The single path from credentials to a [`Session`], and from a session to server-side logout.
#[derive(Clone)]
pub struct AuthGateway {
    base: Url,
    client: reqwest::Client,
}

impl AuthGateway {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url { &self.base }

    /// One attempt, no retries.
    pub async fn authenticate(&self, email: &str, password: &str) -> ClientResult<Session> {
        validate_credentials(email, password)?;
        let email = email.trim();
        let url = api_url(&self.base, "auth/login")?;
        debug!(target: "stockroom::auth", "POST {} user={}", url, email);
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(|e| ClientError::connectivity(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| ClientError::connectivity(e.to_string()))?;
        match classify_login_response(status, &body, email, password) {
            Ok(session) => {
                info!(target: "stockroom::auth", "login ok user={} role={}", session.email(), session.role());
                Ok(session)
            }
            Err(e) => {
                info!(target: "stockroom::auth", "login failed user={} kind={} status={}", email, e.kind(), status);
                Err(e)
            }
        }
    }

    /// Tell the backend the session is over. Best-effort: failures are only logged.
    pub async fn end_session(&self, session: &Session) {
        let url = match api_url(&self.base, "auth/logout") {
            Ok(u) => u,
            Err(e) => {
                warn!(target: "stockroom::auth", "logout notification skipped: {}", e);
                return;
            }
        };
        match self.client.post(url).header(AUTHORIZATION, session.authorization_header()).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(target: "stockroom::auth", "logout acknowledged user={}", session.email());
            }
            Ok(resp) => {
                warn!(target: "stockroom::auth", "logout notification rejected: HTTP {}", resp.status());
            }
            Err(e) => {
                warn!(target: "stockroom::auth", "logout notification failed: {}", e);
            }
        }
    }
}
