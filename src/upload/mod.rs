//! WebDAV upload pipeline.
//!
//! [`WebDavUploader`] creates the remote directory hierarchy with `MKCOL`,
//! uploads with `PUT` and lists collections with `PROPFIND`. Session expiry is
//! recovered once per request in long-lived token mode.

mod error;
mod orchestrator;
mod target;

pub use error::{Operation, UploadError};
pub use orchestrator::{MKCOL_ACCEPTED, PROPFIND_ACCEPTED, PUT_ACCEPTED, WebDavUploader};
pub use target::{DEFAULT_CONTENT_TYPE, UploadBody, UploadTarget};
