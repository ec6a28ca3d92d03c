//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use webdav_uploader::upload::DEFAULT_CONTENT_TYPE;

/// Upload a file to a WebDAV staging area.
///
/// Directories below the upload root are created as needed. With a
/// long-lived token (`sst_token` in the config file) an expired session token
/// is refreshed automatically.
#[derive(Parser, Debug)]
#[command(name = "webdav-upload")]
#[command(author, version, about)]
pub struct Args {
    /// Local file to upload
    pub file: PathBuf,

    /// Remote directory below the upload root, e.g. `tmp/reports`
    pub remote_dir: String,

    /// Remote file name (defaults to the local file name)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Content type sent with the upload
    #[arg(short = 't', long, default_value = DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/webdav-uploader/config)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WebDAV host, overriding `host.webdav`
    #[arg(long, value_name = "HOST")]
    pub webdav_host: Option<String>,

    /// Token exchange host, overriding `host.gdc`
    #[arg(long, value_name = "HOST")]
    pub gdc_host: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Remote file name: `--name`, else the local file name.
    #[must_use]
    pub fn remote_file_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
    }
}
