//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::sync::Arc;
use std::time::Duration;

use webdav_uploader::{
    Session, ServiceEndpoint, TokenAuthenticator, UserLogin, WebDavUploader,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LONG_LIVED_TOKEN: &str = "T1";
pub const TOKEN_PATH: &str = "/gdc/account/token";

/// WebDAV endpoint rooted at `/uploads` on the mock server.
pub fn webdav_endpoint(server: &MockServer) -> ServiceEndpoint {
    ServiceEndpoint::from_url("webdav", &format!("{}/uploads", server.uri())).unwrap()
}

/// Token endpoint rooted at `/gdc` on the mock server.
pub fn token_endpoint(server: &MockServer) -> ServiceEndpoint {
    ServiceEndpoint::from_url("token exchange", &format!("{}/gdc", server.uri())).unwrap()
}

pub fn token_authenticator(server: &MockServer) -> TokenAuthenticator {
    TokenAuthenticator::with_timeouts(
        token_endpoint(server),
        Duration::from_secs(2),
        Duration::from_secs(10),
    )
    .unwrap()
}

/// Token-mode uploader against `server`, optionally seeded with a session token.
pub fn token_uploader(server: &MockServer, seeded_session_token: Option<&str>) -> WebDavUploader {
    let session =
        Session::token(LONG_LIVED_TOKEN, Arc::new(token_authenticator(server))).unwrap();
    if let Some(session_token) = seeded_session_token {
        session.set_current_login(
            UserLogin::new(None, None, LONG_LIVED_TOKEN, session_token).unwrap(),
        );
    }
    WebDavUploader::with_session(
        webdav_endpoint(server),
        Arc::new(session),
        Duration::from_secs(2),
        Duration::from_secs(10),
    )
    .unwrap()
}

/// Basic-credential uploader against `server`.
pub fn basic_uploader(server: &MockServer) -> WebDavUploader {
    WebDavUploader::with_session(
        webdav_endpoint(server),
        Arc::new(Session::basic("user", "secret")),
        Duration::from_secs(2),
        Duration::from_secs(10),
    )
    .unwrap()
}

/// `Set-Cookie` value the token endpoint answers with.
pub fn session_cookie(value: &str) -> String {
    format!("GDCAuthTT={value}; Path={TOKEN_PATH}; HttpOnly")
}

/// Mounts a token endpoint that issues `session_token`, expected `times` times.
pub async fn mount_token_exchange(server: &MockServer, session_token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", session_cookie(session_token).as_str())
                .set_body_string("{}"),
        )
        .expect(times)
        .mount(server)
        .await;
}
