//! Runtime configuration, read from `STOCKROOM_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::error::{ClientError, ClientResult};
use crate::identity::DEFAULT_SESSION_KEY;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root; always ends with `/` so relative joins append.
    pub api_base: Url,
    pub session_dir: PathBuf,
    pub session_key: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let api = std::env::var("STOCKROOM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let session_dir = std::env::var("STOCKROOM_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_dir());
        let session_key = std::env::var("STOCKROOM_SESSION_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_string());
        let timeout_ms = match std::env::var("STOCKROOM_HTTP_TIMEOUT_MS") {
            Ok(v) => v.trim().parse::<u64>().with_context(|| format!("STOCKROOM_HTTP_TIMEOUT_MS must be an integer, got '{}'", v))?,
            Err(_) => DEFAULT_TIMEOUT_MS,
        };
        Ok(Self {
            api_base: parse_api_base(&api)?,
            session_dir,
            session_key,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn default_session_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(h) if !h.is_empty() => PathBuf::from(h).join(".stockroom"),
        _ => PathBuf::from(".stockroom"),
    }
}

/// Parse the API root and give it a trailing slash.
pub fn parse_api_base(s: &str) -> Result<Url> {
    let mut url = Url::parse(s.trim()).with_context(|| format!("invalid API URL '{}'", s))?;
    if !url.path().ends_with('/') {
        let p = format!("{}/", url.path());
        url.set_path(&p);
    }
    Ok(url)
}

/// Resolve an endpoint path (leading `/` optional) under the API root. Absolute URLs
/// and `..` segments that would leave the root are rejected.
pub fn api_url(base: &Url, path: &str) -> ClientResult<Url> {
    let url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| ClientError::malformed(format!("invalid request path '{}': {}", path, e)))?;
    if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
        return Err(ClientError::malformed(format!("request path '{}' leaves the API root {}", path, base)));
    }
    Ok(url)
}
