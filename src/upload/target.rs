//! Upload target: remote directory, file name, content type and body.

use std::path::PathBuf;

use reqwest::Body;
use tokio_util::io::ReaderStream;

use super::error::UploadError;

/// Default content type when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A request body that can be produced again for the one-shot resend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBody {
    /// In-memory bytes.
    Bytes(Vec<u8>),
    /// Local file, re-opened and streamed on every send.
    File(PathBuf),
}

impl UploadBody {
    /// Builds a fresh request body.
    ///
    /// Streamed file bodies come with the file length, to be sent as
    /// `Content-Length`; in-memory bodies carry their own.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Body`] when the file cannot be opened.
    pub async fn to_body(&self) -> Result<(Body, Option<u64>), UploadError> {
        match self {
            Self::Bytes(bytes) => Ok((Body::from(bytes.clone()), None)),
            Self::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|error| UploadError::body(path, error))?;
                let length = file
                    .metadata()
                    .await
                    .map_err(|error| UploadError::body(path, error))?
                    .len();
                Ok((Body::wrap_stream(ReaderStream::new(file)), Some(length)))
            }
        }
    }
}

/// Where and what to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    remote_directory_path: Vec<String>,
    remote_file_name: String,
    content_type: String,
    body: UploadBody,
}

impl UploadTarget {
    /// Builds a target; `remote_dir` is split on `/` with empty segments dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTarget`] for an empty directory, an empty
    /// file name, or a `.`/`..` segment.
    pub fn new(
        remote_dir: &str,
        remote_file_name: impl Into<String>,
        content_type: impl Into<String>,
        body: UploadBody,
    ) -> Result<Self, UploadError> {
        let remote_directory_path = split_remote_dir(remote_dir)?;
        let remote_file_name = remote_file_name.into();
        if remote_file_name.is_empty() || remote_file_name.contains('/') {
            return Err(UploadError::invalid_target(format!(
                "remote file name {remote_file_name:?} must be a non-empty single path segment"
            )));
        }
        if remote_file_name == "." || remote_file_name == ".." {
            return Err(UploadError::invalid_target(format!(
                "remote file name {remote_file_name:?} is reserved"
            )));
        }
        let content_type = content_type.into();
        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        };
        Ok(Self {
            remote_directory_path,
            remote_file_name,
            content_type,
            body,
        })
    }

    /// Directory segments, outermost first.
    #[must_use]
    pub fn remote_directory_path(&self) -> &[String] {
        &self.remote_directory_path
    }

    /// Name of the uploaded resource.
    #[must_use]
    pub fn remote_file_name(&self) -> &str {
        &self.remote_file_name
    }

    /// MIME type sent with the PUT.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The body to send.
    #[must_use]
    pub fn body(&self) -> &UploadBody {
        &self.body
    }

    /// Encoded path of every directory level, outermost first:
    /// `["/a", "/a/b"]` for `a/b`.
    #[must_use]
    pub fn directory_prefixes(&self) -> Vec<String> {
        let mut prefix = String::new();
        self.remote_directory_path
            .iter()
            .map(|segment| {
                prefix.push('/');
                prefix.push_str(&urlencoding::encode(segment));
                prefix.clone()
            })
            .collect()
    }

    /// Encoded path of the resource: `/a/b/name`.
    #[must_use]
    pub fn resource_path(&self) -> String {
        format!(
            "{}/{}",
            encoded_directory_path(&self.remote_directory_path),
            urlencoding::encode(&self.remote_file_name)
        )
    }
}

/// Splits `a//b/` into `["a", "b"]`.
pub(crate) fn split_remote_dir(remote_dir: &str) -> Result<Vec<String>, UploadError> {
    let segments: Vec<String> = remote_dir
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(UploadError::invalid_target(format!(
            "remote directory {remote_dir:?} has no path segments"
        )));
    }
    if let Some(segment) = segments.iter().find(|s| *s == "." || *s == "..") {
        return Err(UploadError::invalid_target(format!(
            "remote directory {remote_dir:?} contains relative segment {segment:?}"
        )));
    }
    Ok(segments)
}

/// `/a/b` with every segment percent-encoded.
pub(crate) fn encoded_directory_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect()
}
