// Session and per-request context

use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal session identifier (UUID v4)
pub type SessionId = String;

/// Opaque Fermi session cookie (`name=value`)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self(cookie.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Fermi username/password pair
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication state of a session against Fermi
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "uid", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Authenticated(String),
    Anonymous,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated(_))
    }
}

/// Explicit per-request context.
///
/// Loaded from the session store before a handler runs and written back
/// afterwards; handlers never reach for ambient session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub session_id: SessionId,
    /// Portal user owning the session
    pub user: String,
    pub session_token: Option<SessionToken>,
    /// Fermi account the cookie belongs to
    pub fermi_uid: Option<String>,
    pub active_transaction_id: Option<String>,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user: user.into(),
            session_token: None,
            fermi_uid: None,
            active_transaction_id: None,
        }
    }

    pub fn clear_authentication(&mut self) {
        self.session_token = None;
        self.fermi_uid = None;
    }
}
