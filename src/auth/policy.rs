//! Cookie validation policies.
//!
//! A policy decides whether a cookie presented by a server may be stored for
//! the request it arrived on. Policies are plain values handed to a
//! [`CookieJar`](super::CookieJar); swapping one changes nothing else.

use std::fmt;

use super::cookies::Cookie;

/// Where a `Set-Cookie` header was received from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOrigin<'a> {
    /// Request host.
    pub host: &'a str,
    /// Request port.
    pub port: u16,
    /// Request path.
    pub path: &'a str,
    /// Whether the request went over TLS.
    pub secure: bool,
}

/// Decides whether a server-provided cookie is acceptable.
///
/// Implementations must be pure: no side effects, same answer for the same input.
pub trait CookiePolicy: Send + Sync + fmt::Debug {
    /// Returns `true` when `cookie` may be stored for a response from `origin`.
    fn accept(&self, cookie: &Cookie, origin: &CookieOrigin<'_>) -> bool;
}

/// Standard validation: domain match, path prefix match, no secure cookies
/// from plain-text origins.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCookiePolicy;

impl CookiePolicy for DefaultCookiePolicy {
    fn accept(&self, cookie: &Cookie, origin: &CookieOrigin<'_>) -> bool {
        if cookie.secure && !origin.secure {
            return false;
        }
        domain_matches(origin.host, &cookie.domain) && path_matches(origin.path, &cookie.path)
    }
}

/// Accepts any cookie declared on the token-exchange path, whatever the
/// request path was; everything else goes through [`DefaultCookiePolicy`].
///
/// The exchange server scopes the session-token cookie to the token path even
/// when the request that triggered it was issued on a sibling path (the login
/// path), which the default path check would refuse.
#[derive(Debug, Clone)]
pub struct TokenPathCookiePolicy {
    token_path: String,
}

impl TokenPathCookiePolicy {
    /// Policy that waives validation for cookies whose path equals `token_path`.
    #[must_use]
    pub fn new(token_path: impl Into<String>) -> Self {
        Self {
            token_path: token_path.into(),
        }
    }
}

impl CookiePolicy for TokenPathCookiePolicy {
    fn accept(&self, cookie: &Cookie, origin: &CookieOrigin<'_>) -> bool {
        cookie.path == self.token_path || DefaultCookiePolicy.accept(cookie, origin)
    }
}

/// RFC 6265 domain matching; a leading dot on the cookie domain is ignored.
pub(crate) fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || (host.ends_with(&domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
            && host.parse::<std::net::IpAddr>().is_err())
}

/// RFC 6265 path matching: `cookie_path` is `request_path` or a directory prefix of it.
pub(crate) fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}
