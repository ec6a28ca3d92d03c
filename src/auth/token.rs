//! Exchange of the long-lived token for a session token.
//!
//! The exchange is a single `GET {base}/account/token` carrying the long-lived
//! token as the `GDCAuthSST` cookie scoped to `{base}/account`. A successful
//! answer (status < 400) sets the short-lived `GDCAuthTT` cookie.
//!
//! [`TokenAuthenticator`] only performs the network call and returns the new
//! [`UserLogin`]; storing it is the caller's job.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::CookieStore;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use tracing::{debug, instrument, trace};
use url::Url;

use super::cookies::{Cookie, CookieJar};
use super::error::AuthenticationError;
use super::login::UserLogin;
use super::policy::TokenPathCookiePolicy;
use crate::config::{CONNECT_TIMEOUT_SECS, ConfigError, REQUEST_TIMEOUT_SECS, ServiceEndpoint};
use crate::http;

/// Cookie carrying the long-lived token on the exchange request.
pub const LONG_LIVED_TOKEN_COOKIE: &str = "GDCAuthSST";

/// Cookie carrying the short-lived session token.
pub const SESSION_TOKEN_COOKIE: &str = "GDCAuthTT";

/// Exchange path, relative to the token endpoint's base path.
pub const TOKEN_PATH: &str = "/account/token";

/// Path the long-lived token cookie is scoped to, relative to the base path.
pub const LONG_LIVED_TOKEN_COOKIE_PATH: &str = "/account";

/// Something that can turn a long-lived token into a fresh [`UserLogin`].
///
/// The uploader holds an `Arc<dyn Authenticator>` so the exchange can be
/// swapped (e.g. counted or stubbed) without touching the upload path.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Exchanges `long_lived_token` for a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the exchange is refused, the
    /// response lacks a session token, or the transport fails.
    async fn authenticate(&self, long_lived_token: &str) -> Result<UserLogin, AuthenticationError>;
}

/// HTTP implementation of [`Authenticator`] against the token-exchange endpoint.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    client: Client,
    endpoint: ServiceEndpoint,
    token_url: Url,
}

impl TokenAuthenticator {
    /// Authenticator with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the token URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, ConfigError> {
        Self::with_timeouts(
            endpoint,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    /// Authenticator with explicit timeouts.
    ///
    /// Redirects are not followed: the session-token cookie must come from the
    /// exchange response itself, and any status below 400 counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the token URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_timeouts(
        endpoint: ServiceEndpoint,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let raw_url = endpoint.url_for(TOKEN_PATH);
        let token_url = Url::parse(&raw_url).map_err(|_| ConfigError::InvalidUrl {
            endpoint: "token exchange",
            url: raw_url.clone(),
        })?;
        let client = http::build_client(None, connect_timeout, request_timeout)?;
        Ok(Self {
            client,
            endpoint,
            token_url,
        })
    }

    /// The endpoint this authenticator talks to.
    #[must_use]
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Full token-exchange URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Fresh per-exchange jar holding only the long-lived token cookie.
    fn exchange_jar(&self, long_lived_token: &str) -> CookieJar {
        let policy = TokenPathCookiePolicy::new(self.endpoint.path_for(TOKEN_PATH));
        let jar = CookieJar::with_policy(Arc::new(policy));
        jar.insert(Cookie::new(
            LONG_LIVED_TOKEN_COOKIE,
            long_lived_token,
            self.endpoint.host(),
            self.endpoint.path_for(LONG_LIVED_TOKEN_COOKIE_PATH),
        ));
        jar
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    #[instrument(skip_all, fields(url = %self.token_url))]
    async fn authenticate(&self, long_lived_token: &str) -> Result<UserLogin, AuthenticationError> {
        let url = self.token_url.as_str();
        let jar = self.exchange_jar(long_lived_token);

        // The exchange API only speaks JSON.
        let mut request = self
            .client
            .get(self.token_url.clone())
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(ACCEPT, "application/json");
        if let Some(cookie_header) = jar.cookies(&self.token_url) {
            request = request.header(COOKIE, cookie_header);
        }

        let response = request
            .send()
            .await
            .map_err(|error| AuthenticationError::transport(url, error))?;

        let response_url = response.url().clone();
        jar.set_cookies(
            &mut response.headers().get_all(SET_COOKIE).iter(),
            &response_url,
        );
        let completed = http::complete(response)
            .await
            .map_err(|error| AuthenticationError::transport(url, error))?;

        match completed.status {
            401 => return Err(AuthenticationError::invalid_credentials(url)),
            status if status >= 400 => {
                return Err(AuthenticationError::unexpected_status(url, status));
            }
            _ => {}
        }

        trace!(cookies = jar.len(), "token exchange cookies harvested");

        let session_token = jar
            .find(SESSION_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthenticationError::missing_session_token(url, SESSION_TOKEN_COOKIE))?;
        debug!(status = completed.status, "token exchange returned a session token");

        UserLogin::new(None, None, long_lived_token, session_token)
            .map_err(|_| AuthenticationError::missing_session_token(url, SESSION_TOKEN_COOKIE))
    }
}
