//! Error types for WebDAV operations.
//!
//! Every variant names the operation and the remote path it failed on, so a
//! failed upload can be reported without re-deriving which step broke.

use std::fmt;
use std::path::PathBuf;

use reqwest::Method;
use thiserror::Error;

use crate::auth::AuthenticationError;
use crate::http::truncate_body;

/// WebDAV operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Collection creation.
    Mkcol,
    /// Resource upload.
    Put,
    /// Collection listing.
    Propfind,
}

impl Operation {
    /// HTTP method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mkcol => "MKCOL",
            Self::Put => "PUT",
            Self::Propfind => "PROPFIND",
        }
    }

    /// The request method for this operation.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTarget`] if the method token is rejected.
    pub fn method(self) -> Result<Method, UploadError> {
        Method::from_bytes(self.as_str().as_bytes()).map_err(|_| UploadError::InvalidTarget {
            reason: format!("{self} is not a valid HTTP method token"),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while creating directories, uploading or listing.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The server answered with a status outside the accepted set.
    #[error("{operation} {path} returned HTTP {actual} (expected one of {expected:?}): {body}")]
    UnexpectedStatus {
        /// Operation that failed.
        operation: Operation,
        /// Remote path of the request.
        path: String,
        /// Accepted status codes.
        expected: Vec<u16>,
        /// Status actually returned.
        actual: u16,
        /// Response body, truncated for diagnostics.
        body: String,
    },

    /// The request timed out.
    #[error("timeout during {operation} {path}")]
    Timeout {
        /// Operation that failed.
        operation: Operation,
        /// Remote path of the request.
        path: String,
    },

    /// Network-level failure (DNS, connection refused, TLS, etc.)
    #[error("network error during {operation} {path}: {source}")]
    Transport {
        /// Operation that failed.
        operation: Operation,
        /// Remote path of the request.
        path: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The session expired and obtaining a new session token failed.
    #[error("re-authentication failed during {operation} {path}: {source}")]
    Reauthentication {
        /// Operation that got the 401.
        operation: Operation,
        /// Remote path of the request.
        path: String,
        /// Why the token exchange failed.
        #[source]
        source: AuthenticationError,
    },

    /// The local file could not be read.
    #[error("cannot read upload body {path}: {source}")]
    Body {
        /// Local file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Remote directory or file name is unusable.
    #[error("invalid upload target: {reason}")]
    InvalidTarget {
        /// What is wrong with the target.
        reason: String,
    },

    /// A 207 response whose body is not a multi-status document.
    #[error("malformed multi-status response for {path}: {reason}")]
    MultiStatus {
        /// Remote path that was listed.
        path: String,
        /// Parse failure.
        reason: String,
    },
}

impl UploadError {
    /// Creates an unexpected-status error; `body` is truncated.
    pub fn unexpected_status(
        operation: Operation,
        path: impl Into<String>,
        expected: &[u16],
        actual: u16,
        body: &str,
    ) -> Self {
        Self::UnexpectedStatus {
            operation,
            path: path.into(),
            expected: expected.to_vec(),
            actual,
            body: truncate_body(body),
        }
    }

    /// Maps a reqwest error, separating timeouts from other transport faults.
    pub fn transport(operation: Operation, path: impl Into<String>, source: reqwest::Error) -> Self {
        let path = path.into();
        if source.is_timeout() {
            Self::Timeout { operation, path }
        } else {
            Self::Transport {
                operation,
                path,
                source,
            }
        }
    }

    /// Creates a re-authentication error.
    pub fn reauthentication(
        operation: Operation,
        path: impl Into<String>,
        source: AuthenticationError,
    ) -> Self {
        Self::Reauthentication {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Creates a body-read error.
    pub fn body(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Body {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-target error.
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }

    /// HTTP status behind this error, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            Self::Reauthentication { source, .. } => source.status(),
            _ => None,
        }
    }

    /// True for a 401 that was surfaced without (further) recovery.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { actual: 401, .. })
    }
}

// No From<reqwest::Error>: the operation and path are needed for context.
