//! End-to-end CLI tests for the webdav-upload binary.

#![allow(deprecated)]

mod support;

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use support::socket_guard::start_mock_server_or_skip;
use support::{TOKEN_PATH, session_cookie};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn command(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("webdav-upload").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, server: &MockServer, extra: &str) -> std::path::PathBuf {
    let port = server.address().port();
    let config_path = dir.path().join("uploader.conf");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        "host.webdav = 127.0.0.1\nport.webdav = {port}\nprotocol.webdav = http\n\
         host.gdc = 127.0.0.1\nport.gdc = {port}\nprotocol.gdc = http\n{extra}"
    )
    .unwrap();
    config_path
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    command(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Upload a file to a WebDAV staging area"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    command(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webdav-upload"));
}

#[test]
fn test_binary_missing_arguments_returns_error() {
    let home = TempDir::new().unwrap();
    command(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_without_credentials_exits_one() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("x.bin");
    std::fs::write(&file, b"x").unwrap();

    let assert = command(&home)
        .arg(&file)
        .arg("tmp")
        .arg("--webdav-host")
        .arg("127.0.0.1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No credentials configured"));
    assert_eq!(assert.get_output().status.code(), Some(1));
}

#[test]
fn test_binary_rejects_unknown_config_key() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.conf");
    std::fs::write(&config, "host.webdav = a\nproxy = b\n").unwrap();

    command(&home)
        .arg("--config")
        .arg(&config)
        .arg("x.bin")
        .arg("tmp")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[tokio::test]
async fn test_binary_uploads_with_token_refresh() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(header("cookie", "GDCAuthSST=T1"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Set-Cookie", session_cookie("tt-1").as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/uploads/tmp"))
        .and(header("cookie", "GDCAuthTT=tt-1"))
        .respond_with(ResponseTemplate::new(201))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(5)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/uploads/tmp/report.csv"))
        .and(header("content-type", "text/csv"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let config = write_config(&home, &server, "sst_token = T1");
    let file = home.path().join("local.csv");
    std::fs::write(&file, b"a,b\n1,2\n").unwrap();

    let mut cmd = command(&home);
    cmd.arg("-q")
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .arg("tmp")
        .arg("--name")
        .arg("report.csv")
        .arg("--content-type")
        .arg("text/csv");

    // assert_cmd blocks; run it off the runtime driving the mock server.
    let output = tokio::task::spawn_blocking(move || cmd.assert().success().get_output().clone())
        .await
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
}

#[tokio::test]
async fn test_binary_basic_mode_401_exits_one() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let config = write_config(&home, &server, "login = user\npassword = secret");
    let file = home.path().join("x.bin");
    std::fs::write(&file, b"x").unwrap();

    let mut cmd = command(&home);
    cmd.arg("--config").arg(&config).arg(&file).arg("tmp");

    let output = tokio::task::spawn_blocking(move || cmd.assert().failure().get_output().clone())
        .await
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("401"), "{stderr}");
    assert!(!stderr.contains("secret"), "{stderr}");
}
