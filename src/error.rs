//! Client error model shared by the auth gateway, the API client and the console.
//! Failures are classified once, at the boundary that observes them, into an
//! `ErrorKind`; callers branch on the kind and never on message text.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::identity::{LOGIN_PATH, UNAUTHORIZED_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingField,
    InvalidEmailFormat,
    Unreachable,
    MalformedResponse,
    UnexpectedStatus,
    InvalidCredentials,
    NotAuthenticated,
    SessionRejected,
    InsufficientRole,
    UnknownRole,
    StorageUnavailable,
}

impl ErrorKind {
    /// Stable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MissingField => "missing_field",
            ErrorKind::InvalidEmailFormat => "invalid_email_format",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::UnexpectedStatus => "unexpected_status",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::NotAuthenticated => "not_authenticated",
            ErrorKind::SessionRejected => "session_rejected",
            ErrorKind::InsufficientRole => "insufficient_role",
            ErrorKind::UnknownRole => "unknown_role",
            ErrorKind::StorageUnavailable => "storage_unavailable",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected before any network call.
    #[error("validation failed ({kind}): {message}")]
    Validation { kind: ErrorKind, message: String },
    /// No response reached us.
    #[error("backend unreachable: {message}")]
    Connectivity { message: String },
    /// The response violates the contract; retrying will not help.
    #[error("protocol error ({kind}): {message}")]
    Protocol { kind: ErrorKind, message: String },
    #[error("authentication failed ({kind}): {message}")]
    Authentication { kind: ErrorKind, message: String },
    #[error("not authorized ({kind}): {message}")]
    Authorization { kind: ErrorKind, message: String },
    #[error("session storage failed: {message}")]
    Storage { message: String },
}

impl ClientError {
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        ClientError::Validation { kind: ErrorKind::MissingField, message: format!("{} is required", field.into()) }
    }
    pub fn invalid_email() -> Self {
        ClientError::Validation { kind: ErrorKind::InvalidEmailFormat, message: "enter a valid email address".into() }
    }
    pub fn connectivity<S: Into<String>>(msg: S) -> Self { ClientError::Connectivity { message: msg.into() } }
    pub fn malformed<S: Into<String>>(msg: S) -> Self { ClientError::Protocol { kind: ErrorKind::MalformedResponse, message: msg.into() } }
    pub fn unexpected_status(status: u16, detail: Option<String>) -> Self {
        let message = match detail {
            Some(d) => format!("HTTP {}: {}", status, d),
            None => format!("HTTP {}", status),
        };
        ClientError::Protocol { kind: ErrorKind::UnexpectedStatus, message }
    }
    pub fn invalid_credentials(detail: Option<String>) -> Self {
        ClientError::Authentication {
            kind: ErrorKind::InvalidCredentials,
            message: detail.unwrap_or_else(|| "invalid email or password".into()),
        }
    }
    pub fn authorization<S: Into<String>>(kind: ErrorKind, msg: S) -> Self { ClientError::Authorization { kind, message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { ClientError::Storage { message: msg.into() } }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { kind, .. }
            | ClientError::Protocol { kind, .. }
            | ClientError::Authentication { kind, .. }
            | ClientError::Authorization { kind, .. } => *kind,
            ClientError::Connectivity { .. } => ErrorKind::Unreachable,
            ClientError::Storage { .. } => ErrorKind::StorageUnavailable,
        }
    }

    /// Whether resubmitting the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Connectivity { .. } | ClientError::Storage { .. })
    }

    /// Message rendered at the form boundary. Input problems are shown verbatim;
    /// infrastructure problems get a generic framing since the user cannot act on them.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation { message, .. } | ClientError::Authentication { message, .. } => message.clone(),
            ClientError::Connectivity { .. } | ClientError::Storage { .. } => {
                "The inventory service is unavailable. Please try again later.".into()
            }
            ClientError::Protocol { .. } => "Something went wrong talking to the server. Please try again later.".into(),
            ClientError::Authorization { kind, .. } => match kind {
                ErrorKind::InsufficientRole | ErrorKind::UnknownRole => "You do not have permission to access this page.".into(),
                _ => "Your session has ended. Please sign in again.".into(),
            },
        }
    }

    /// Where the UI must navigate after this error, if anywhere.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::NotAuthenticated | ErrorKind::SessionRejected => Some(LOGIN_PATH),
            ErrorKind::InsufficientRole | ErrorKind::UnknownRole => Some(UNAUTHORIZED_PATH),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::malformed(err.to_string())
        } else {
            ClientError::connectivity(err.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
