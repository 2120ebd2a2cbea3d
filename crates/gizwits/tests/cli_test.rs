//! Integration tests for the `gizwits` CLI binary.
//!
//! Argument parsing, completions, profile management and error exits run
//! without a relay; device listing runs against a wiremock directory service.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `gizwits` binary with env isolation.
///
/// Clears all `GIZWITS_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn gizwits_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gizwits");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("GIZWITS_PROFILE")
        .env_remove("GIZWITS_APP_ID")
        .env_remove("GIZWITS_OPEN_ID")
        .env_remove("GIZWITS_API_HOST")
        .env_remove("GIZWITS_OUTPUT")
        .env_remove("GIZWITS_TIMEOUT");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = gizwits_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    gizwits_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("devices")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("subdevices"))
            .and(predicate::str::contains("bind")),
    );
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    gizwits_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Usage errors ────────────────────────────────────────────────────

#[test]
fn test_write_requires_a_payload() {
    let home = tempfile::tempdir().unwrap();
    gizwits_cmd(home.path())
        .args(["write", "D1"])
        .assert()
        .code(2);
}

#[test]
fn test_subdevices_delete_requires_targets() {
    let home = tempfile::tempdir().unwrap();
    gizwits_cmd(home.path())
        .args(["subdevices", "delete", "D1"])
        .assert()
        .code(2);
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_devices_without_config_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = gizwits_cmd(home.path()).arg("devices").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("No application configured"));
}

#[test]
fn test_devices_without_open_id_is_auth_error() {
    let home = tempfile::tempdir().unwrap();
    let output = gizwits_cmd(home.path())
        .args(["devices", "--app-id", "app-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_profile_lifecycle() {
    let home = tempfile::tempdir().unwrap();

    gizwits_cmd(home.path())
        .args(["config", "init", "--name", "home", "--app-id", "app-1"])
        .assert()
        .success();
    gizwits_cmd(home.path())
        .args(["config", "set", "page_limit", "50"])
        .assert()
        .success();
    gizwits_cmd(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home *"));
    gizwits_cmd(home.path())
        .args(["config", "show", "-o", "json-compact"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""app_id":"app-1""#)
                .and(predicate::str::contains(r#""page_limit":50"#)),
        );
    gizwits_cmd(home.path())
        .args(["config", "use", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

// ── Directory service ───────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_lists_bound_devices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app/users"))
        .and(header("X-Gizwits-Application-Id", "app-1"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "uid": "u1", "token": "t1" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app/bindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "did": "AAAAAAAAAAAAAAAAAAAAAA", "mac": "m1", "type": "normal",
                  "host": "relay.example", "wss_port": 8880 },
                { "did": "BBBBBBBBBBBBBBBBBBBBBB", "mac": "m2", "type": "center_control",
                  "host": "relay.example", "wss_port": 8880 }
            ]
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let address = server.address();
    let api_host = format!("{}:{}", address.ip(), address.port());
    let home_path = home.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        gizwits_cmd(&home_path)
            .args(["config", "init", "--app-id", "app-1", "--api-host", &api_host])
            .assert()
            .success();
        gizwits_cmd(&home_path)
            .args(["config", "set", "use_tls", "false"])
            .assert()
            .success();
        gizwits_cmd(&home_path)
            .args(["devices", "--open-id", "open-1", "-o", "plain"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "AAAAAAAAAAAAAAAAAAAAAA\nBBBBBBBBBBBBBBBBBBBBBB"
    );
}
