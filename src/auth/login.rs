//! The record produced by a successful token exchange.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::config::ConfigError;

/// Result of a successful long-lived token exchange.
///
/// Immutable once built; a re-authentication produces a new value that
/// supersedes the old one rather than mutating it.
///
/// Equality and hashing consider `profile_uri` only, so two logins for the
/// same profile compare equal even when their session tokens differ. Code
/// that needs to know whether a login is *newer* must not rely on this; the
/// session tracks login generations for that.
///
/// Token values are redacted in `Debug` and `Display` output.
#[derive(Clone)]
pub struct UserLogin {
    profile_uri: Option<String>,
    state: Option<String>,
    long_lived_token: String,
    session_token: String,
}

impl UserLogin {
    /// Creates a login record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCredential`] when either token is empty.
    pub fn new(
        profile_uri: Option<String>,
        state: Option<String>,
        long_lived_token: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let long_lived_token = long_lived_token.into();
        let session_token = session_token.into();
        if long_lived_token.is_empty() {
            return Err(ConfigError::EmptyCredential {
                field: "long-lived token",
            });
        }
        if session_token.is_empty() {
            return Err(ConfigError::EmptyCredential {
                field: "session token",
            });
        }
        Ok(Self {
            profile_uri,
            state,
            long_lived_token,
            session_token,
        })
    }

    /// Server-assigned profile URI, if known.
    #[must_use]
    pub fn profile_uri(&self) -> Option<&str> {
        self.profile_uri.as_deref()
    }

    /// Server-assigned session state URI, if known.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The long-lived token this login was exchanged from (sensitive).
    #[must_use]
    pub fn long_lived_token(&self) -> &str {
        &self.long_lived_token
    }

    /// The short-lived session token (sensitive).
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }
}

impl PartialEq for UserLogin {
    fn eq(&self, other: &Self) -> bool {
        self.profile_uri == other.profile_uri
    }
}

impl Eq for UserLogin {}

impl Hash for UserLogin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.profile_uri.hash(state);
    }
}

impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("profile_uri", &self.profile_uri)
            .field("state", &self.state)
            .field("long_lived_token", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UserLogin [profileUri={}, state={}]",
            self.profile_uri.as_deref().unwrap_or("none"),
            self.state.as_deref().unwrap_or("none")
        )
    }
}
