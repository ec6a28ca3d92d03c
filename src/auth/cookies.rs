//! Session cookie jar.
//!
//! Holds name/value cookies keyed by `(name, domain)` and plugs into reqwest
//! through [`CookieStore`], so it is attached to every outgoing request and
//! fed from every response. A cookie with an existing `(name, domain)` pair
//! replaces the previous entry; the jar never holds duplicates.
//!
//! Cookies are session-lifetime only and never written to disk.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use tracing::{debug, trace, warn};
use url::Url;

use super::policy::{CookieOrigin, CookiePolicy, DefaultCookiePolicy, domain_matches, path_matches};

/// A single cookie.
///
/// The value is redacted in `Debug` output to prevent accidental logging of
/// tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Domain the cookie is scoped to (no leading dot).
    pub domain: String,
    /// URL path scope.
    pub path: String,
    /// Whether the cookie may only be sent over HTTPS.
    pub secure: bool,
    /// Cookie value (sensitive, never log).
    value: String,
}

impl Cookie {
    /// Creates a non-secure cookie.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: normalize_domain(&domain.into()),
            path: path.into(),
            secure: false,
            value: value.into(),
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// What a `Set-Cookie` header asks the jar to do.
#[derive(Debug, PartialEq, Eq)]
enum SetCookie {
    Store(Cookie),
    Remove { name: String, domain: String },
}

/// Concurrent cookie jar with a pluggable validation policy.
///
/// `CookieJar` is `Send + Sync` and meant to be shared through `Arc`. Every
/// operation touches one `DashMap` shard for a single step; no lock is ever
/// held across an `.await`.
pub struct CookieJar {
    cookies: DashMap<(String, String), Cookie>,
    policy: Arc<dyn CookiePolicy>,
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("len", &self.cookies.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    /// Empty jar using [`DefaultCookiePolicy`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Arc::new(DefaultCookiePolicy))
    }

    /// Empty jar validating server cookies with `policy`.
    #[must_use]
    pub fn with_policy(policy: Arc<dyn CookiePolicy>) -> Self {
        Self {
            cookies: DashMap::new(),
            policy,
        }
    }

    /// Inserts `cookie`, replacing any cookie with the same name and domain.
    ///
    /// Returns the replaced cookie, if any. Client-side inserts bypass the
    /// validation policy.
    pub fn insert(&self, cookie: Cookie) -> Option<Cookie> {
        let key = (cookie.name.clone(), cookie.domain.clone());
        let previous = self.cookies.insert(key, cookie);
        if let Some(previous) = &previous {
            debug!(name = %previous.name, domain = %previous.domain, "replaced cookie");
        }
        previous
    }

    /// Removes the cookie with `name` on `domain`.
    pub fn remove(&self, name: &str, domain: &str) -> Option<Cookie> {
        self.cookies
            .remove(&(name.to_string(), normalize_domain(domain)))
            .map(|(_, cookie)| cookie)
    }

    /// Returns the cookie with `name` on `domain`.
    #[must_use]
    pub fn get(&self, name: &str, domain: &str) -> Option<Cookie> {
        self.cookies
            .get(&(name.to_string(), normalize_domain(domain)))
            .map(|entry| entry.value().clone())
    }

    /// Returns the first cookie called `name`, whatever its domain.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Cookie> {
        self.cookies
            .iter()
            .find(|entry| entry.key().0 == name)
            .map(|entry| entry.value().clone())
    }

    /// Number of cookies called `name` on `domain` (0 or 1).
    #[must_use]
    pub fn count(&self, name: &str, domain: &str) -> usize {
        let domain = normalize_domain(domain);
        self.cookies
            .iter()
            .filter(|entry| entry.key().0 == name && entry.key().1 == domain)
            .count()
    }

    /// Total number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Cookies that should be sent with a request to `url`, longest path first.
    #[must_use]
    pub fn matching(&self, url: &Url) -> Vec<Cookie> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let secure = url.scheme() == "https";
        let mut matched: Vec<Cookie> = self
            .cookies
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|cookie| {
                (!cookie.secure || secure)
                    && domain_matches(host, &cookie.domain)
                    && path_matches(url.path(), &cookie.path)
            })
            .collect();
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then(a.name.cmp(&b.name)));
        matched
    }

    /// Parses `Set-Cookie` header values received from `url` and stores the
    /// ones the policy accepts.
    ///
    /// Returns how many cookies were stored or removed.
    pub fn store_response_cookies<'a>(
        &self,
        headers: impl Iterator<Item = &'a HeaderValue>,
        url: &Url,
    ) -> usize {
        let Some(host) = url.host_str() else {
            return 0;
        };
        let origin = CookieOrigin {
            host,
            port: url.port_or_known_default().unwrap_or(0),
            path: url.path(),
            secure: url.scheme() == "https",
        };
        let default_path = default_cookie_path(url.path());

        let mut applied = 0;
        for header in headers {
            let Ok(raw) = header.to_str() else {
                warn!("skipping non-ASCII Set-Cookie header");
                continue;
            };
            match parse_set_cookie(raw, host, &default_path) {
                Some(SetCookie::Store(cookie)) => {
                    if !self.policy.accept(&cookie, &origin) {
                        warn!(
                            name = %cookie.name,
                            domain = %cookie.domain,
                            cookie_path = %cookie.path,
                            request_path = %origin.path,
                            "rejected cookie by policy"
                        );
                        continue;
                    }
                    trace!(name = %cookie.name, domain = %cookie.domain, "stored response cookie");
                    self.insert(cookie);
                    applied += 1;
                }
                Some(SetCookie::Remove { name, domain }) => {
                    trace!(name = %name, domain = %domain, "server expired cookie");
                    self.remove(&name, &domain);
                    applied += 1;
                }
                None => warn!("skipping malformed Set-Cookie header"),
            }
        }
        applied
    }

    /// Renders the `Cookie` request header for `url`.
    #[must_use]
    pub fn header_for(&self, url: &Url) -> Option<HeaderValue> {
        let matched = self.matching(url);
        if matched.is_empty() {
            return None;
        }
        let header = matched
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.store_response_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// RFC 6265 default-path of a request path.
fn default_cookie_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

fn parse_set_cookie(raw: &str, request_host: &str, default_path: &str) -> Option<SetCookie> {
    let parsed = cookie::Cookie::parse(raw).ok()?;
    let domain = parsed
        .domain()
        .filter(|domain| !domain.is_empty())
        .map_or_else(|| normalize_domain(request_host), normalize_domain);

    if is_expired(&parsed, SystemTime::now()) {
        return Some(SetCookie::Remove {
            name: parsed.name().to_string(),
            domain,
        });
    }

    let path = parsed
        .path()
        .filter(|path| path.starts_with('/'))
        .unwrap_or(default_path);
    let mut cookie = Cookie::new(
        parsed.name(),
        parsed.value().trim_matches('"'),
        domain,
        path,
    );
    cookie.secure = parsed.secure().unwrap_or(false);
    Some(SetCookie::Store(cookie))
}

/// `Max-Age` wins over `Expires`; either one in the past deletes the cookie.
fn is_expired(parsed: &cookie::Cookie<'_>, now: SystemTime) -> bool {
    if let Some(max_age) = parsed.max_age() {
        return max_age.is_zero() || max_age.is_negative();
    }
    parsed
        .expires_datetime()
        .is_some_and(|expires| SystemTime::from(expires) <= now)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::policy::TokenPathCookiePolicy;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_insert_replaces_same_name_and_domain() {
        let jar = CookieJar::new();
        assert!(jar.insert(Cookie::new("GDCAuthTT", "old", "dav.example.com", "/")).is_none());
        let replaced = jar.insert(Cookie::new("GDCAuthTT", "new", "DAV.example.com", "/"));

        assert_eq!(replaced.unwrap().value(), "old");
        assert_eq!(jar.count("GDCAuthTT", "dav.example.com"), 1);
        assert_eq!(jar.get("GDCAuthTT", "dav.example.com").unwrap().value(), "new");
    }

    #[test]
    fn test_header_for_matches_domain_and_path() {
        let jar = CookieJar::new();
        jar.insert(Cookie::new("GDCAuthSST", "sst", "secure.example.com", "/gdc/account"));
        jar.insert(Cookie::new("other", "x", "other.example.com", "/"));

        let header = jar.header_for(&url("https://secure.example.com/gdc/account/token"));
        assert_eq!(header.unwrap().to_str().unwrap(), "GDCAuthSST=sst");
        assert!(jar.header_for(&url("https://secure.example.com/gdc/projects")).is_none());
    }

    #[test]
    fn test_header_for_orders_longest_path_first() {
        let jar = CookieJar::new();
        jar.insert(Cookie::new("a", "1", "h.example.com", "/"));
        jar.insert(Cookie::new("b", "2", "h.example.com", "/uploads"));
        let header = jar.header_for(&url("http://h.example.com/uploads/x")).unwrap();
        assert_eq!(header.to_str().unwrap(), "b=2; a=1");
    }

    #[test]
    fn test_store_response_cookies_uses_defaults() {
        let jar = CookieJar::new();
        let headers = [HeaderValue::from_static("session=abc; HttpOnly")];
        let stored = jar.store_response_cookies(headers.iter(), &url("http://h.example.com/a/b"));

        assert_eq!(stored, 1);
        let cookie = jar.get("session", "h.example.com").unwrap();
        assert_eq!(cookie.path, "/a");
        assert_eq!(cookie.value(), "abc");
    }

    #[test]
    fn test_default_policy_rejects_sibling_path() {
        let jar = CookieJar::new();
        let headers = [HeaderValue::from_static("GDCAuthTT=tt; Path=/gdc/account/token")];
        let stored = jar.store_response_cookies(
            headers.iter(),
            &url("https://secure.example.com/gdc/account/login"),
        );
        assert_eq!(stored, 0);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_token_policy_accepts_sibling_path() {
        let jar = CookieJar::with_policy(Arc::new(TokenPathCookiePolicy::new("/gdc/account/token")));
        let headers = [HeaderValue::from_static("GDCAuthTT=tt; Path=/gdc/account/token; Secure")];
        let stored = jar.store_response_cookies(
            headers.iter(),
            &url("https://secure.example.com/gdc/account/login"),
        );
        assert_eq!(stored, 1);
        assert_eq!(jar.find("GDCAuthTT").unwrap().value(), "tt");
    }

    #[test]
    fn test_max_age_zero_removes_cookie() {
        let jar = CookieJar::new();
        jar.insert(Cookie::new("GDCAuthTT", "tt", "h.example.com", "/"));
        let headers = [HeaderValue::from_static("GDCAuthTT=; Max-Age=0; Path=/")];
        jar.store_response_cookies(headers.iter(), &url("http://h.example.com/"));
        assert!(jar.get("GDCAuthTT", "h.example.com").is_none());
    }

    #[test]
    fn test_past_expires_removes_cookie() {
        let jar = CookieJar::new();
        jar.insert(Cookie::new("GDCAuthTT", "stale", "h.example.com", "/"));
        let headers = [HeaderValue::from_static(
            "GDCAuthTT=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
        )];
        let applied = jar.store_response_cookies(headers.iter(), &url("http://h.example.com/"));

        assert_eq!(applied, 1);
        assert!(jar.get("GDCAuthTT", "h.example.com").is_none());
    }

    #[test]
    fn test_future_expires_keeps_cookie() {
        let jar = CookieJar::new();
        let headers = [HeaderValue::from_static(
            "GDCAuthTT=fresh; Expires=Fri, 31 Dec 9999 23:59:59 GMT; Path=/",
        )];
        jar.store_response_cookies(headers.iter(), &url("http://h.example.com/"));
        assert_eq!(jar.get("GDCAuthTT", "h.example.com").unwrap().value(), "fresh");
    }

    #[test]
    fn test_max_age_overrides_past_expires() {
        let jar = CookieJar::new();
        let headers = [HeaderValue::from_static(
            "GDCAuthTT=fresh; Max-Age=3600; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
        )];
        jar.store_response_cookies(headers.iter(), &url("http://h.example.com/"));
        assert_eq!(jar.get("GDCAuthTT", "h.example.com").unwrap().value(), "fresh");
    }

    #[test]
    fn test_domain_attribute_drops_leading_dot() {
        let jar = CookieJar::new();
        let headers = [HeaderValue::from_static("sid=1; Domain=.Example.com; Path=/")];
        jar.store_response_cookies(headers.iter(), &url("http://h.example.com/"));
        assert!(jar.get("sid", "example.com").is_some());
    }

    #[test]
    fn test_malformed_set_cookie_is_skipped() {
        let jar = CookieJar::new();
        let headers = [
            HeaderValue::from_static("no-equals-sign"),
            HeaderValue::from_static("=value-without-name"),
        ];
        assert_eq!(
            jar.store_response_cookies(headers.iter(), &url("http://h.example.com/")),
            0
        );
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let jar = CookieJar::new();
        let mut cookie = Cookie::new("s", "1", "h.example.com", "/");
        cookie.secure = true;
        jar.insert(cookie);
        assert!(jar.header_for(&url("http://h.example.com/")).is_none());
        assert!(jar.header_for(&url("https://h.example.com/")).is_some());
    }

    #[test]
    fn test_cookie_debug_redacts_value() {
        let cookie = Cookie::new("GDCAuthTT", "super-secret", "h.example.com", "/");
        let rendered = format!("{cookie:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_default_cookie_path() {
        assert_eq!(default_cookie_path(""), "/");
        assert_eq!(default_cookie_path("/"), "/");
        assert_eq!(default_cookie_path("/token"), "/");
        assert_eq!(default_cookie_path("/gdc/account/token"), "/gdc/account");
    }
}
