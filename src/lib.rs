//! WebDAV Uploader Library
//!
//! Authenticated file uploads to a WebDAV staging area. A session
//! authenticates either with static credentials or with a long-lived token
//! that is exchanged for short-lived session tokens; an expired session token
//! is refreshed transparently, once per request, and concurrent refreshes are
//! coalesced into a single exchange.
//!
//! # Architecture
//!
//! - [`auth`] - Login records, cookie jar and policies, token exchange
//! - [`session`] - Shared session state and single-flight refresh
//! - [`upload`] - `MKCOL`/`PUT`/`PROPFIND` orchestration with re-authentication
//! - [`multistatus`] - Href extraction from `207 Multi-Status` bodies
//! - [`config`] - Endpoints, authentication mode and timeouts

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod http;
pub mod multistatus;
pub mod session;
pub mod upload;
mod user_agent;

// Re-export commonly used types
pub use auth::{
    AuthenticationError, Authenticator, Cookie, CookieJar, CookiePolicy, TokenAuthenticator,
    UserLogin,
};
pub use config::{
    AuthMode, CONNECT_TIMEOUT_SECS, ConfigError, DEFAULT_PORT, DEFAULT_SCHEME,
    DEFAULT_TOKEN_BASE_PATH, DEFAULT_WEBDAV_BASE_PATH, REQUEST_TIMEOUT_SECS, ServiceEndpoint,
    UploaderConfig,
};
pub use http::CompletedResponse;
pub use multistatus::{MultiStatusError, parse_multi_status};
pub use session::{LoginSnapshot, Session};
pub use upload::{Operation, UploadBody, UploadError, UploadTarget, WebDavUploader};
