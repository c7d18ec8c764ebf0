//! Authenticated access to the inventory backend (products, stock, orders, employees,
//! suppliers, reports). Payloads are passed through as JSON; this layer only owns
//! credentials and the uniform handling of a rejected session.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::api_url;
use crate::error::{ClientError, ClientResult, ErrorKind};
use crate::identity::{backend_message, AuthContext};

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    ctx: Arc<AuthContext>,
}

impl ApiClient {
    pub fn new(base: Url, timeout: Duration, ctx: Arc<AuthContext>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client, ctx })
    }

    pub async fn get(&self, path: &str) -> ClientResult<Value> { self.send(Method::GET, path, None).await }
    pub async fn delete(&self, path: &str) -> ClientResult<Value> { self.send(Method::DELETE, path, None).await }
    pub async fn post(&self, path: &str, body: &Value) -> ClientResult<Value> { self.send(Method::POST, path, Some(body)).await }
    pub async fn put(&self, path: &str, body: &Value) -> ClientResult<Value> { self.send(Method::PUT, path, Some(body)).await }

    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> ClientResult<Value> {
        // token comes from the stored record, and only while it belongs to the signed-in user
        let Some(session) = self.ctx.active_session() else {
            return Err(ClientError::authorization(ErrorKind::NotAuthenticated, "no active session"));
        };
        let url = api_url(&self.base, path)?;
        debug!(target: "stockroom::api", "{} {} user={}", method, url, session.email());
        let mut req = self.client.request(method.clone(), url).header(AUTHORIZATION, session.authorization_header());
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(|e| ClientError::connectivity(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| ClientError::connectivity(e.to_string()))?;
        match status {
            401 => {
                warn!(target: "stockroom::api", "{} {} rejected the session; logging out", method, path);
                self.ctx.apply_logout();
                Err(ClientError::authorization(ErrorKind::SessionRejected, "the server ended this session"))
            }
            403 => Err(ClientError::authorization(
                ErrorKind::InsufficientRole,
                backend_message(&text).unwrap_or_else(|| format!("{} {} is not permitted for this role", method, path)),
            )),
            s if (200..300).contains(&s) => {
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text).map_err(|e| ClientError::malformed(format!("{} {} returned non-JSON body: {}", method, path, e)))
            }
            s => Err(ClientError::unexpected_status(s, backend_message(&text))),
        }
    }
}
