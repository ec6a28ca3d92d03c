//! Constructor-time configuration for uploader sessions.
//!
//! Nothing here reads files or the environment; the `webdav-upload` binary
//! owns that. These types only validate what callers hand in.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (5 minutes for large uploads).
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default port for both endpoints.
pub const DEFAULT_PORT: u16 = 443;

/// Default scheme for both endpoints.
pub const DEFAULT_SCHEME: &str = "https";

/// Default WebDAV collection root that uploads are placed under.
pub const DEFAULT_WEBDAV_BASE_PATH: &str = "/uploads";

/// Default base path of the token-exchange REST API.
pub const DEFAULT_TOKEN_BASE_PATH: &str = "/gdc";

/// Errors raised while validating session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Host name is empty.
    #[error("{endpoint} host cannot be empty")]
    EmptyHost {
        /// Which endpoint was being configured.
        endpoint: &'static str,
    },

    /// Port is outside 1..=65535.
    #[error("valid {endpoint} port must be specified (got {port})")]
    InvalidPort {
        /// Which endpoint was being configured.
        endpoint: &'static str,
        /// The rejected port.
        port: u32,
    },

    /// Scheme is not http or https.
    #[error("unsupported {endpoint} scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme {
        /// Which endpoint was being configured.
        endpoint: &'static str,
        /// The rejected scheme.
        scheme: String,
    },

    /// Endpoint pieces do not form a valid URL.
    #[error("invalid {endpoint} endpoint URL '{url}'")]
    InvalidUrl {
        /// Which endpoint was being configured.
        endpoint: &'static str,
        /// The URL that failed to parse.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    HttpClient {
        /// Builder error description.
        reason: String,
    },

    /// A required credential was empty.
    #[error("{field} must not be empty")]
    EmptyCredential {
        /// Name of the empty field (never its value).
        field: &'static str,
    },
}

/// Scheme, host, port and base path of one remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    scheme: String,
    host: String,
    port: u16,
    base_path: String,
}

impl ServiceEndpoint {
    /// Validates and builds an endpoint.
    ///
    /// `base_path` is normalised to start with `/` and carry no trailing `/`
    /// (an empty string means the server root).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty host, a port outside 1..=65535 or
    /// a scheme other than `http`/`https`.
    pub fn new(
        endpoint: &'static str,
        scheme: &str,
        host: &str,
        port: u32,
        base_path: &str,
    ) -> Result<Self, ConfigError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost { endpoint });
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|port| *port > 0)
            .ok_or(ConfigError::InvalidPort { endpoint, port })?;
        let scheme = scheme.trim().to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::UnsupportedScheme { endpoint, scheme });
        }

        let trimmed = base_path.trim().trim_matches('/');
        let base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };

        let service = Self {
            scheme,
            host: host.to_string(),
            port,
            base_path,
        };
        let root = service.url_for("/");
        Url::parse(&root).map_err(|_| ConfigError::InvalidUrl {
            endpoint,
            url: root.clone(),
        })?;
        Ok(service)
    }

    /// WebDAV endpoint on `host` with the default scheme, port and `/uploads` root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyHost`] when `host` is empty.
    pub fn webdav(host: &str) -> Result<Self, ConfigError> {
        Self::new(
            "webdav",
            DEFAULT_SCHEME,
            host,
            u32::from(DEFAULT_PORT),
            DEFAULT_WEBDAV_BASE_PATH,
        )
    }

    /// Token-exchange endpoint on `host` with the default scheme, port and `/gdc` root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyHost`] when `host` is empty.
    pub fn token_exchange(host: &str) -> Result<Self, ConfigError> {
        Self::new(
            "token exchange",
            DEFAULT_SCHEME,
            host,
            u32::from(DEFAULT_PORT),
            DEFAULT_TOKEN_BASE_PATH,
        )
    }

    /// Builds an endpoint from a URL such as `http://127.0.0.1:8080/uploads`.
    ///
    /// The URL path becomes the base path. Mostly useful against local servers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL does not parse or has no host.
    pub fn from_url(endpoint: &'static str, url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl {
            endpoint,
            url: url.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or(ConfigError::EmptyHost { endpoint })?;
        let port = parsed
            .port_or_known_default()
            .ok_or(ConfigError::InvalidPort { endpoint, port: 0 })?;
        Self::new(
            endpoint,
            parsed.scheme(),
            host,
            u32::from(port),
            parsed.path(),
        )
    }

    /// URL scheme (`http` or `https`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name, used as the cookie domain.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Normalised base path (empty or `/segment[/segment...]`).
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Absolute path below the base path: `base_path` + `path`.
    #[must_use]
    pub fn path_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_path)
        } else {
            format!("{}/{path}", self.base_path)
        }
    }

    /// Full URL of `path` below the base path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.path_for(path)
        )
    }
}

/// How a session authenticates against the WebDAV server.
///
/// The two modes are mutually exclusive for the lifetime of a session.
#[derive(Clone)]
pub enum AuthMode {
    /// HTTP basic authentication on every request; a 401 is terminal.
    Basic {
        /// Account name.
        username: String,
        /// Account password (sensitive, never logged).
        password: String,
    },
    /// Long-lived token exchanged for short-lived session tokens on demand.
    Token {
        /// Long-lived token (sensitive, never logged).
        long_lived_token: String,
        /// Where the token exchange is performed.
        token_endpoint: ServiceEndpoint,
    },
}

impl AuthMode {
    /// Basic-credential mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCredential`] for an empty username.
    pub fn basic(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        if username.is_empty() {
            return Err(ConfigError::EmptyCredential { field: "username" });
        }
        Ok(Self::Basic {
            username,
            password: password.into(),
        })
    }

    /// Long-lived token mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCredential`] for an empty token.
    pub fn token(
        long_lived_token: impl Into<String>,
        token_endpoint: ServiceEndpoint,
    ) -> Result<Self, ConfigError> {
        let long_lived_token = long_lived_token.into();
        if long_lived_token.trim().is_empty() {
            return Err(ConfigError::EmptyCredential {
                field: "long-lived token",
            });
        }
        Ok(Self::Token {
            long_lived_token,
            token_endpoint,
        })
    }

    /// Whether this is the long-lived token mode.
    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Token { token_endpoint, .. } => f
                .debug_struct("Token")
                .field("long_lived_token", &"[REDACTED]")
                .field("token_endpoint", token_endpoint)
                .finish(),
        }
    }
}

/// Everything needed to open an uploader session.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// WebDAV endpoint; its base path is the upload root.
    pub webdav: ServiceEndpoint,
    /// Authentication mode.
    pub auth: AuthMode,
    /// TCP connect timeout for both endpoints.
    pub connect_timeout: Duration,
    /// Whole-request timeout for both endpoints.
    pub request_timeout: Duration,
}

impl UploaderConfig {
    /// Config with the default timeouts.
    #[must_use]
    pub fn new(webdav: ServiceEndpoint, auth: AuthMode) -> Self {
        Self {
            webdav,
            auth,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Overrides both timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: Duration, request_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalises_base_path() {
        let endpoint = ServiceEndpoint::new("webdav", "HTTPS", "dav.example.com", 443, "uploads/")
            .unwrap();
        assert_eq!(endpoint.scheme(), "https");
        assert_eq!(endpoint.base_path(), "/uploads");
        assert_eq!(endpoint.path_for("tmp"), "/uploads/tmp");
        assert_eq!(
            endpoint.url_for("/tmp/x.bin"),
            "https://dav.example.com:443/uploads/tmp/x.bin"
        );
    }

    #[test]
    fn test_endpoint_empty_base_path_is_root() {
        let endpoint = ServiceEndpoint::new("webdav", "http", "localhost", 8080, "/").unwrap();
        assert_eq!(endpoint.base_path(), "");
        assert_eq!(endpoint.path_for("/a"), "/a");
    }

    #[test]
    fn test_endpoint_rejects_empty_host() {
        let err = ServiceEndpoint::new("webdav", "https", "  ", 443, "").unwrap_err();
        assert_eq!(err, ConfigError::EmptyHost { endpoint: "webdav" });
    }

    #[test]
    fn test_endpoint_rejects_port_out_of_range() {
        for port in [0, 65_536] {
            let err = ServiceEndpoint::new("webdav", "https", "h", port, "").unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPort { .. }), "{port}: {err}");
        }
    }

    #[test]
    fn test_endpoint_rejects_unknown_scheme() {
        let err = ServiceEndpoint::new("webdav", "ftp", "h", 21, "").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_endpoint_from_url_uses_path_as_base() {
        let endpoint = ServiceEndpoint::from_url("webdav", "http://127.0.0.1:9000/uploads").unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 9000);
        assert_eq!(endpoint.base_path(), "/uploads");
    }

    #[test]
    fn test_default_constructors() {
        let webdav = ServiceEndpoint::webdav("dav.example.com").unwrap();
        assert_eq!(webdav.port(), DEFAULT_PORT);
        assert_eq!(webdav.base_path(), DEFAULT_WEBDAV_BASE_PATH);
        let gdc = ServiceEndpoint::token_exchange("secure.example.com").unwrap();
        assert_eq!(gdc.base_path(), DEFAULT_TOKEN_BASE_PATH);
    }

    #[test]
    fn test_token_mode_rejects_empty_token() {
        let endpoint = ServiceEndpoint::token_exchange("secure.example.com").unwrap();
        let err = AuthMode::token("", endpoint).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyCredential {
                field: "long-lived token"
            }
        );
    }

    #[test]
    fn test_auth_mode_debug_redacts_secrets() {
        let endpoint = ServiceEndpoint::token_exchange("secure.example.com").unwrap();
        let token = AuthMode::token("super-secret-sst", endpoint).unwrap();
        let basic = AuthMode::basic("alice", "hunter2").unwrap();
        let rendered = format!("{token:?} {basic:?}");
        assert!(!rendered.contains("super-secret-sst"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("alice"));
        assert!(token.is_token());
        assert!(!basic.is_token());
    }
}
