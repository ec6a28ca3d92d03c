//! Shared User-Agent string for WebDAV and token-exchange HTTP clients.

/// Default User-Agent for every request (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("webdav-uploader/{version} (reqwest)")
}
