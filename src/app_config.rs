//! Configuration file loading for the upload CLI.
//!
//! The file is a flat `key = value` list using the property names of the
//! service's test configuration (`host.webdav`, `sst_token`, ...). Values may
//! be bare or double-quoted; `#` starts a comment outside quotes.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use webdav_uploader::{
    AuthMode, CONNECT_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_SCHEME, DEFAULT_TOKEN_BASE_PATH,
    DEFAULT_WEBDAV_BASE_PATH, REQUEST_TIMEOUT_SECS, ServiceEndpoint, UploaderConfig,
};

/// Values read from the configuration file; every key is optional.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub webdav_host: Option<String>,
    pub webdav_port: Option<u32>,
    pub webdav_protocol: Option<String>,
    pub gdc_host: Option<String>,
    pub gdc_port: Option<u32>,
    pub gdc_protocol: Option<String>,
    pub sst_token: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("FileConfig")
            .field("webdav_host", &self.webdav_host)
            .field("webdav_port", &self.webdav_port)
            .field("webdav_protocol", &self.webdav_protocol)
            .field("gdc_host", &self.gdc_host)
            .field("gdc_port", &self.gdc_port)
            .field("gdc_protocol", &self.gdc_protocol)
            .field("sst_token", &redacted(&self.sst_token))
            .field("login", &self.login)
            .field("password", &redacted(&self.password))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Host overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct HostOverrides {
    pub webdav_host: Option<String>,
    pub gdc_host: Option<String>,
}

impl FileConfig {
    /// Validates value ranges that do not depend on other keys.
    pub fn validate(&self) -> Result<()> {
        validate_port("port.webdav", self.webdav_port)?;
        validate_port("port.gdc", self.gdc_port)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        Ok(())
    }

    /// Resolves the file values and CLI overrides into an uploader configuration.
    ///
    /// Token mode is selected when `sst_token` is set; otherwise `login` and
    /// `password` are required.
    pub fn into_uploader_config(self, overrides: &HostOverrides) -> Result<UploaderConfig> {
        let webdav_host = overrides
            .webdav_host
            .clone()
            .or(self.webdav_host)
            .context("No WebDAV host configured: set `host.webdav` or pass --webdav-host")?;
        let webdav = ServiceEndpoint::new(
            "webdav",
            self.webdav_protocol.as_deref().unwrap_or(DEFAULT_SCHEME),
            &webdav_host,
            self.webdav_port.unwrap_or(u32::from(DEFAULT_PORT)),
            DEFAULT_WEBDAV_BASE_PATH,
        )
        .context("Invalid WebDAV endpoint")?;

        let auth = if let Some(token) = self.sst_token {
            let gdc_host = overrides
                .gdc_host
                .clone()
                .or(self.gdc_host)
                .context("Token mode needs a token host: set `host.gdc` or pass --gdc-host")?;
            let token_endpoint = ServiceEndpoint::new(
                "token exchange",
                self.gdc_protocol.as_deref().unwrap_or(DEFAULT_SCHEME),
                &gdc_host,
                self.gdc_port.unwrap_or(u32::from(DEFAULT_PORT)),
                DEFAULT_TOKEN_BASE_PATH,
            )
            .context("Invalid token endpoint")?;
            AuthMode::token(token, token_endpoint).context("Invalid `sst_token`")?
        } else {
            let (Some(login), Some(password)) = (self.login, self.password) else {
                bail!("No credentials configured: set `sst_token`, or both `login` and `password`");
            };
            AuthMode::basic(login, password).context("Invalid `login`")?
        };

        Ok(UploaderConfig::new(webdav, auth).with_timeouts(
            Duration::from_secs(self.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS)),
            Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS)),
        ))
    }
}

fn validate_port(field: &str, value: Option<u32>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=65_535).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=65535");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path the config was read from, if any.
    pub path: Option<PathBuf>,
    /// Parsed values; empty when no file was found.
    pub config: FileConfig,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/webdav-uploader/config`
/// 2. `$HOME/.config/webdav-uploader/config`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("webdav-uploader")
                .join("config"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("webdav-uploader")
            .join("config"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` (which must exist), else the default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file_config(path)?,
        });
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => {
            let config = load_file_config(&path)?;
            Ok(LoadedConfig {
                path: Some(path),
                config,
            })
        }
        _ => Ok(LoadedConfig {
            path: None,
            config: FileConfig::default(),
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = unquote(raw_value.trim())
            .with_context(|| format!("Invalid `{key}` value on line {line_number}"))?;

        match key {
            "host.webdav" => cfg.webdav_host = Some(non_empty(key, value, line_number)?),
            "port.webdav" => cfg.webdav_port = Some(parse_port(key, &value, line_number)?),
            "protocol.webdav" => cfg.webdav_protocol = Some(non_empty(key, value, line_number)?),
            "host.gdc" => cfg.gdc_host = Some(non_empty(key, value, line_number)?),
            "port.gdc" => cfg.gdc_port = Some(parse_port(key, &value, line_number)?),
            "protocol.gdc" => cfg.gdc_protocol = Some(non_empty(key, value, line_number)?),
            "sst_token" => cfg.sst_token = Some(non_empty(key, value, line_number)?),
            "login" => cfg.login = Some(non_empty(key, value, line_number)?),
            "password" => cfg.password = Some(value),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(&value).with_context(|| {
                    format!("Invalid `{key}` value on line {line_number}")
                })?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(&value).with_context(|| {
                    format!("Invalid `{key}` value on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn unquote(raw_value: &str) -> Result<String> {
    if !raw_value.starts_with('"') {
        return Ok(raw_value.to_string());
    }
    if raw_value.len() < 2 || !raw_value.ends_with('"') {
        bail!("Unterminated double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn non_empty(key: &str, value: String, line_number: usize) -> Result<String> {
    if value.trim().is_empty() {
        bail!("Empty `{key}` value on line {line_number}");
    }
    Ok(value)
}

fn parse_port(key: &str, value: &str, line_number: usize) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Invalid `{key}` value on line {line_number}: expected a port"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_token_mode() {
        let cfg = parse_config_str(
            r#"
            # staging
            host.webdav = secure-di.example.com
            host.gdc = "secure.example.com"   # token host
            sst_token = "abc#def"
            request_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.webdav_host.as_deref(), Some("secure-di.example.com"));
        assert_eq!(cfg.gdc_host.as_deref(), Some("secure.example.com"));
        assert_eq!(cfg.sst_token.as_deref(), Some("abc#def"));
        assert_eq!(cfg.request_timeout_secs, Some(60));
        assert_eq!(cfg.connect_timeout_secs, None);
    }

    #[test]
    fn test_parse_config_unknown_key_reports_line() {
        let err = parse_config_str("host.webdav = a\nproxy = b\n").unwrap_err();
        assert!(err.to_string().contains("'proxy' on line 2"), "{err}");
    }

    #[test]
    fn test_parse_config_missing_equals_reports_line() {
        let err = parse_config_str("\n\nhost.webdav\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn test_parse_config_rejects_port_out_of_range() {
        let err = parse_config_str("port.webdav = 70000").unwrap_err();
        assert!(err.to_string().contains("port.webdav"), "{err}");
        assert!(parse_config_str("port.gdc = https").is_err());
    }

    #[test]
    fn test_parse_config_rejects_zero_timeout() {
        let err = parse_config_str("connect_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"), "{err}");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = parse_config_str("sst_token = secret-token\nlogin = me\npassword = hunter2").unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("me"));
    }

    #[test]
    fn test_into_uploader_config_token_mode() {
        let cfg = parse_config_str(
            "host.webdav = dav.example.com\nprotocol.webdav = http\nport.webdav = 8080\nhost.gdc = gdc.example.com\nsst_token = T1",
        )
        .unwrap();
        let config = cfg.into_uploader_config(&HostOverrides::default()).unwrap();
        assert_eq!(config.webdav.url_for("/tmp"), "http://dav.example.com:8080/uploads/tmp");
        match config.auth {
            AuthMode::Token { token_endpoint, .. } => {
                assert_eq!(token_endpoint.host(), "gdc.example.com");
                assert_eq!(token_endpoint.base_path(), "/gdc");
            }
            AuthMode::Basic { .. } => panic!("expected token mode"),
        }
    }

    #[test]
    fn test_into_uploader_config_basic_mode_and_overrides() {
        let cfg = parse_config_str("host.webdav = a.example.com\nlogin = me\npassword = pw").unwrap();
        let overrides = HostOverrides {
            webdav_host: Some("b.example.com".to_string()),
            gdc_host: None,
        };
        let config = cfg.into_uploader_config(&overrides).unwrap();
        assert_eq!(config.webdav.host(), "b.example.com");
        assert!(!config.auth.is_token());
        assert_eq!(config.request_timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_into_uploader_config_requires_credentials() {
        let cfg = parse_config_str("host.webdav = a.example.com\nlogin = me").unwrap();
        let err = cfg.into_uploader_config(&HostOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("No credentials"), "{err}");
    }

    #[test]
    fn test_into_uploader_config_token_mode_requires_gdc_host() {
        let cfg = parse_config_str("host.webdav = a.example.com\nsst_token = T1").unwrap();
        let err = cfg.into_uploader_config(&HostOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("--gdc-host"), "{err}");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host.webdav = dav.example.com").unwrap();
        let loaded = load_config(Some(file.path())).unwrap();
        assert_eq!(loaded.path.as_deref(), Some(file.path()));
        assert_eq!(loaded.config.webdav_host.as_deref(), Some("dav.example.com"));
    }

    #[test]
    fn test_load_config_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"), "{err}");
    }
}
