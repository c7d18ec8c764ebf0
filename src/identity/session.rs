use serde::{Deserialize, Serialize};

use super::role::Role;

/// One authenticated identity. Every field is always set; an incomplete record
/// cannot be constructed and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord", into = "SessionRecord")]
pub struct Session {
    email: String,
    role: Role,
    credential_token: String,
}

impl Session {
    /// Returns `None` when either string field is blank.
    pub fn new(email: impl Into<String>, role: Role, credential_token: impl Into<String>) -> Option<Self> {
        let email = email.into();
        let credential_token = credential_token.into();
        if email.trim().is_empty() || credential_token.trim().is_empty() {
            return None;
        }
        Some(Self { email, role, credential_token })
    }

    pub fn email(&self) -> &str { &self.email }
    pub fn role(&self) -> Role { self.role }
    pub fn credential_token(&self) -> &str { &self.credential_token }

    /// Value for the `Authorization` header on backend calls.
    pub fn authorization_header(&self) -> String { format!("Basic {}", self.credential_token) }
}

/// Persisted layout: `{email, role, token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    email: String,
    role: Role,
    token: String,
}

impl TryFrom<SessionRecord> for Session {
    type Error = String;

    fn try_from(rec: SessionRecord) -> Result<Self, Self::Error> {
        Session::new(rec.email, rec.role, rec.token).ok_or_else(|| "session record has an empty field".to_string())
    }
}

impl From<Session> for SessionRecord {
    fn from(s: Session) -> Self {
        SessionRecord { email: s.email, role: s.role, token: s.credential_token }
    }
}
