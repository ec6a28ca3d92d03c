//! HTTP client construction and the connection-releasing call primitive.
//!
//! Every response is read to the end inside [`complete`] and handed back as a
//! [`CompletedResponse`], which owns no connection. Reauthentication only ever
//! sees a `CompletedResponse`, so the connection of the request that got a 401
//! is already back in the pool when the token exchange asks for one.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy, redirect};
use tracing::{debug, warn};

use crate::auth::CookieJar;
use crate::config::ConfigError;
use crate::user_agent;

/// Maximum number of response body characters kept for diagnostics.
pub const MAX_DIAGNOSTIC_BODY_CHARS: usize = 512;

/// Status and body of a finished request; the connection has been released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body.
    pub body: String,
}

/// Reads `response` to completion and drops it, returning the connection to the pool.
///
/// # Errors
///
/// Returns the transport error if reading the body fails.
pub(crate) async fn complete(response: reqwest::Response) -> Result<CompletedResponse, reqwest::Error> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(CompletedResponse { status, body })
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_DIAGNOSTIC_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_DIAGNOSTIC_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

/// Builds a pooled client, optionally with a cookie provider.
///
/// Redirects are never followed: WebDAV answers `MKCOL` on an existing
/// collection with 301, and the token exchange must read its cookies from the
/// first response.
///
/// Some sandboxed environments panic while querying system proxy settings;
/// the builder then retries with proxies taken from the environment only.
pub(crate) fn build_client(
    cookie_jar: Option<Arc<CookieJar>>,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, ConfigError> {
    debug!(
        connect_timeout_ms = connect_timeout.as_millis(),
        request_timeout_ms = request_timeout.as_millis(),
        cookies = cookie_jar.is_some(),
        "building HTTP client"
    );
    let try_build = |env_proxies_only: bool| {
        catch_unwind(AssertUnwindSafe(|| {
            let mut builder = base_client_builder(cookie_jar.clone(), connect_timeout, request_timeout);
            if env_proxies_only {
                builder = with_env_proxies(builder.no_proxy());
            }
            builder.build()
        }))
    };

    let built = match try_build(false) {
        Ok(built) => built,
        Err(_) => {
            warn!("HTTP client builder panicked while loading system proxy settings; retrying with environment proxies");
            try_build(true).map_err(|_| ConfigError::HttpClient {
                reason: "client builder panicked while loading proxy settings".to_string(),
            })?
        }
    };
    built.map_err(|error| ConfigError::HttpClient {
        reason: error.to_string(),
    })
}

fn base_client_builder(
    cookie_jar: Option<Arc<CookieJar>>,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .gzip(true)
        .redirect(redirect::Policy::none())
        .user_agent(user_agent::default_user_agent());
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}

fn with_env_proxies(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(proxy) = Proxy::https(&proxy)
    {
        builder = builder.proxy(proxy);
    }
    if let Some(proxy) = env_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(proxy) = Proxy::http(&proxy)
    {
        builder = builder.proxy(proxy);
    }
    builder
}

fn env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
