//! Error types for the token exchange.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while exchanging a long-lived token for a session token.
///
/// Cloneable so one failed exchange can be reported to every task waiting on
/// the same refresh. Token values never appear in messages.
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// The exchange endpoint answered 401: the long-lived token was refused.
    #[error("invalid credentials: token exchange at {url} returned HTTP 401")]
    InvalidCredentials {
        /// Token-exchange URL.
        url: String,
    },

    /// The exchange succeeded but the response carried no session-token cookie.
    #[error("missing session token: response from {url} carried no {cookie} cookie")]
    MissingSessionToken {
        /// Token-exchange URL.
        url: String,
        /// Name of the expected cookie.
        cookie: &'static str,
    },

    /// Any other non-success status.
    #[error("unexpected status {status} returned by token exchange at {url}")]
    UnexpectedStatus {
        /// Token-exchange URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The exchange request timed out.
    #[error("timeout during token exchange at {url}")]
    Timeout {
        /// Token-exchange URL.
        url: String,
    },

    /// Network-level failure (DNS, connection refused, TLS, etc.)
    #[error("network error during token exchange at {url}: {source}")]
    Transport {
        /// Token-exchange URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// The exchange task ended without a result (panicked or runtime shut down).
    #[error("token exchange aborted: {reason}")]
    ExchangeAborted {
        /// Description of how the task ended.
        reason: String,
    },

    /// A refresh was requested on a session using static credentials.
    #[error("token exchange is not available: session uses static credentials")]
    TokenModeDisabled,
}

impl AuthenticationError {
    /// Creates an invalid-credentials error.
    pub fn invalid_credentials(url: impl Into<String>) -> Self {
        Self::InvalidCredentials { url: url.into() }
    }

    /// Creates a missing-session-token error.
    pub fn missing_session_token(url: impl Into<String>, cookie: &'static str) -> Self {
        Self::MissingSessionToken {
            url: url.into(),
            cookie,
        }
    }

    /// Creates an unexpected-status error.
    pub fn unexpected_status(url: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            url: url.into(),
            status,
        }
    }

    /// Maps a reqwest error, separating timeouts from other transport faults.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Transport {
                url,
                source: Arc::new(source),
            }
        }
    }

    /// HTTP status behind this error, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidCredentials { .. } => Some(401),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// No From<reqwest::Error>: every variant needs the exchange URL for context,
// which the source error does not reliably carry.
