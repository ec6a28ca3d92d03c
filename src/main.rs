//! CLI entry point for the WebDAV upload tool.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use webdav_uploader::WebDavUploader;

mod app_config;
mod cli;

use app_config::HostOverrides;
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_config(args.config.as_deref())?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), "loaded configuration file");
    }
    let overrides = HostOverrides {
        webdav_host: args.webdav_host.clone(),
        gdc_host: args.gdc_host.clone(),
    };
    let config = loaded.config.into_uploader_config(&overrides)?;
    let token_mode = config.auth.is_token();

    let remote_file_name = args
        .remote_file_name()
        .with_context(|| format!("Cannot derive a remote name from '{}'", args.file.display()))?;

    let uploader = WebDavUploader::new(config).context("Failed to initialise uploader")?;
    info!(
        host = %uploader.endpoint().host(),
        token_mode,
        "uploading {} to {}/{}",
        args.file.display(),
        args.remote_dir,
        remote_file_name
    );

    uploader
        .transfer_file(
            &args.file,
            &args.remote_dir,
            &remote_file_name,
            &args.content_type,
        )
        .await
        .with_context(|| format!("Upload of '{}' failed", args.file.display()))?;

    info!(
        exchanges = uploader.session().exchange_count(),
        "Upload complete"
    );
    Ok(())
}
