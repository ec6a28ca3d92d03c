//! WebDAV uploader: directory creation, resource upload and listing.
//!
//! Every request goes through [`WebDavUploader::execute_with_reauth`]. In
//! token mode a 401 triggers exactly one session refresh and one resend; a
//! second failure is surfaced. In basic mode a 401 is terminal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::{Operation, UploadError};
use super::target::{UploadBody, UploadTarget, encoded_directory_path, split_remote_dir};
use crate::auth::{Cookie, CookieJar, SESSION_TOKEN_COOKIE};
use crate::config::{ConfigError, ServiceEndpoint, UploaderConfig};
use crate::http::{self, CompletedResponse};
use crate::multistatus::parse_multi_status;
use crate::session::Session;

/// Statuses accepted for `MKCOL`: created, or already exists (moved permanently).
pub const MKCOL_ACCEPTED: &[u16] = &[201, 301];

/// Statuses accepted for `PUT`: created or overwritten.
pub const PUT_ACCEPTED: &[u16] = &[201, 204];

/// Status accepted for `PROPFIND`.
pub const PROPFIND_ACCEPTED: &[u16] = &[207];

const DEPTH: HeaderName = HeaderName::from_static("depth");

const PROPFIND_ALLPROP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;

enum RequestBody<'a> {
    Empty,
    Xml(&'static str),
    Upload {
        body: &'a UploadBody,
        content_type: &'a str,
    },
}

/// Everything needed to send (and resend) one request.
struct PreparedRequest<'a> {
    operation: Operation,
    path: String,
    url: Url,
    depth: Option<&'static str>,
    body: RequestBody<'a>,
}

/// Uploads files into a WebDAV tree, re-authenticating on session expiry.
///
/// Cheap to clone; clones share the HTTP client, the cookie jar and the
/// session, so concurrent uploads from clones coalesce their token refreshes.
///
/// # Example
///
/// ```no_run
/// use webdav_uploader::{AuthMode, ServiceEndpoint, UploaderConfig, WebDavUploader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let auth = AuthMode::token("long-lived-token", ServiceEndpoint::token_exchange("secure.example.com")?)?;
/// let config = UploaderConfig::new(ServiceEndpoint::webdav("secure-di.example.com")?, auth);
/// let uploader = WebDavUploader::new(config)?;
/// uploader
///     .transfer_bytes(b"a,b\n1,2\n".to_vec(), "tmp/reports", "data.csv", "text/csv")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebDavUploader {
    client: Client,
    endpoint: ServiceEndpoint,
    jar: Arc<CookieJar>,
    session: Arc<Session>,
}

impl WebDavUploader {
    /// Builds an uploader and its session from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either HTTP client cannot be built.
    pub fn new(config: UploaderConfig) -> Result<Self, ConfigError> {
        let session =
            Session::from_auth_mode(&config.auth, config.connect_timeout, config.request_timeout)?;
        Self::with_session(
            config.webdav,
            Arc::new(session),
            config.connect_timeout,
            config.request_timeout,
        )
    }

    /// Builds an uploader around an existing session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] when the HTTP client cannot be built.
    pub fn with_session(
        endpoint: ServiceEndpoint,
        session: Arc<Session>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let jar = Arc::new(CookieJar::new());
        let client = http::build_client(Some(Arc::clone(&jar)), connect_timeout, request_timeout)?;
        Ok(Self {
            client,
            endpoint,
            jar,
            session,
        })
    }

    /// The shared session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The cookie jar attached to every WebDAV request.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    /// The WebDAV endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Uploads a local file into `remote_dir` as `remote_file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Body`] when `path` cannot be read,
    /// [`UploadError::InvalidTarget`] when it is not a regular file, and any
    /// error of [`upload`](Self::upload).
    pub async fn transfer_file(
        &self,
        path: impl AsRef<Path>,
        remote_dir: &str,
        remote_file_name: &str,
        content_type: &str,
    ) -> Result<(), UploadError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|error| UploadError::body(path, error))?;
        if !metadata.is_file() {
            return Err(UploadError::invalid_target(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let target = UploadTarget::new(
            remote_dir,
            remote_file_name,
            content_type,
            UploadBody::File(path.to_path_buf()),
        )?;
        self.upload(&target).await
    }

    /// Uploads an in-memory body into `remote_dir` as `remote_file_name`.
    ///
    /// # Errors
    ///
    /// Same as [`upload`](Self::upload).
    pub async fn transfer_bytes(
        &self,
        bytes: impl Into<Vec<u8>>,
        remote_dir: &str,
        remote_file_name: &str,
        content_type: &str,
    ) -> Result<(), UploadError> {
        let target = UploadTarget::new(
            remote_dir,
            remote_file_name,
            content_type,
            UploadBody::Bytes(bytes.into()),
        )?;
        self.upload(&target).await
    }

    /// Creates every directory level of `target`, then uploads its body.
    ///
    /// Directories are created outermost first and the first failure aborts
    /// the upload; the `PUT` is only sent once every level exists.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] for the first failed step.
    #[instrument(skip(self, target), fields(resource = %target.resource_path()))]
    pub async fn upload(&self, target: &UploadTarget) -> Result<(), UploadError> {
        info!(action = "webdav_upload", status = "start", "upload started");
        let outcome = self.upload_target(target).await;
        match &outcome {
            Ok(()) => info!(action = "webdav_upload", status = "finished", "upload finished"),
            Err(error) => warn!(
                action = "webdav_upload",
                status = "error",
                error = %error,
                "upload failed"
            ),
        }
        outcome
    }

    async fn upload_target(&self, target: &UploadTarget) -> Result<(), UploadError> {
        self.create_directories(target).await?;

        let path = self.endpoint.path_for(&target.resource_path());
        let request = PreparedRequest {
            operation: Operation::Put,
            url: self.url_for(&path)?,
            path,
            depth: None,
            body: RequestBody::Upload {
                body: target.body(),
                content_type: target.content_type(),
            },
        };
        self.execute_with_reauth(&request, PUT_ACCEPTED).await?;
        Ok(())
    }

    async fn create_directories(&self, target: &UploadTarget) -> Result<(), UploadError> {
        for prefix in target.directory_prefixes() {
            let path = self.endpoint.path_for(&prefix);
            debug!(path = %path, "creating collection");
            let request = PreparedRequest {
                operation: Operation::Mkcol,
                url: self.url_for(&path)?,
                path,
                depth: None,
                body: RequestBody::Empty,
            };
            self.execute_with_reauth(&request, MKCOL_ACCEPTED).await?;
        }
        Ok(())
    }

    /// Lists the hrefs directly below `remote_dir` (the collection itself included).
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTarget`] for an empty directory, the
    /// request error, or [`UploadError::MultiStatus`] for an unparsable body.
    #[instrument(skip(self))]
    pub async fn list(&self, remote_dir: &str) -> Result<Vec<String>, UploadError> {
        let segments = split_remote_dir(remote_dir)?;
        let path = self
            .endpoint
            .path_for(&format!("{}/", encoded_directory_path(&segments)));
        let request = PreparedRequest {
            operation: Operation::Propfind,
            url: self.url_for(&path)?,
            path,
            depth: Some("1"),
            body: RequestBody::Xml(PROPFIND_ALLPROP),
        };
        let response = self.execute_with_reauth(&request, PROPFIND_ACCEPTED).await?;
        parse_multi_status(&response.body).map_err(|error| UploadError::MultiStatus {
            path: request.path.clone(),
            reason: error.to_string(),
        })
    }

    /// Sends `request`; on a 401 in token mode refreshes the session once and
    /// resends. The first response is fully read before the refresh starts.
    async fn execute_with_reauth(
        &self,
        request: &PreparedRequest<'_>,
        accepted: &[u16],
    ) -> Result<CompletedResponse, UploadError> {
        let observed_generation = self.pre_authenticate();
        let response = self.send(request).await?;
        if response.status != 401 || !self.session.is_token_mode() {
            return check_status(request, accepted, response);
        }

        info!(
            action = "webdav_upload",
            status = "tt_token_expired",
            operation = %request.operation,
            path = %request.path,
            "session token expired"
        );
        self.session
            .refresh(observed_generation)
            .await
            .map_err(|error| {
                UploadError::reauthentication(request.operation, request.path.clone(), error)
            })?;
        self.pre_authenticate();

        info!(
            action = "webdav_upload",
            status = "resending_request",
            operation = %request.operation,
            path = %request.path,
            "resending request with refreshed session token"
        );
        let response = self.send(request).await?;
        check_status(request, accepted, response)
    }

    /// Mirrors the current login into the jar as the session-token cookie.
    ///
    /// Returns the login generation the next request is sent with.
    fn pre_authenticate(&self) -> u64 {
        if !self.session.is_token_mode() {
            return 0;
        }
        self.session.with_current_login(|snapshot| {
            self.jar.insert(Cookie::new(
                SESSION_TOKEN_COOKIE,
                snapshot.login.session_token(),
                self.endpoint.host(),
                "/",
            ));
        })
    }

    async fn send(&self, request: &PreparedRequest<'_>) -> Result<CompletedResponse, UploadError> {
        let operation = request.operation;
        let mut builder = self.client.request(operation.method()?, request.url.clone());
        if let Some((username, password)) = self.session.basic_credentials() {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(depth) = request.depth {
            builder = builder.header(DEPTH, depth);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Xml(xml) => builder
                .header(CONTENT_TYPE, "application/xml; charset=utf-8")
                .body(*xml),
            RequestBody::Upload { body, content_type } => {
                let (body, length) = body.to_body().await?;
                let builder = builder.header(CONTENT_TYPE, *content_type);
                match length {
                    Some(length) => builder.header(CONTENT_LENGTH, length).body(body),
                    None => builder.body(body),
                }
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|error| UploadError::transport(operation, request.path.clone(), error))?;
        let completed = http::complete(response)
            .await
            .map_err(|error| UploadError::transport(operation, request.path.clone(), error))?;
        debug!(
            operation = %operation,
            path = %request.path,
            status = completed.status,
            "request completed"
        );
        Ok(completed)
    }

    fn url_for(&self, path: &str) -> Result<Url, UploadError> {
        let raw = format!(
            "{}://{}:{}{path}",
            self.endpoint.scheme(),
            self.endpoint.host(),
            self.endpoint.port()
        );
        Url::parse(&raw)
            .map_err(|error| UploadError::invalid_target(format!("invalid URL {raw}: {error}")))
    }
}

fn check_status(
    request: &PreparedRequest<'_>,
    accepted: &[u16],
    response: CompletedResponse,
) -> Result<CompletedResponse, UploadError> {
    if accepted.contains(&response.status) {
        Ok(response)
    } else {
        Err(UploadError::unexpected_status(
            request.operation,
            request.path.clone(),
            accepted,
            response.status,
            &response.body,
        ))
    }
}
