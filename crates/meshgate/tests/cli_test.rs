//! Integration tests for the `meshgate` CLI binary.
//!
//! Argument parsing, help output, completions, config handling and error
//! exit codes. Gateway-bound commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `meshgate` binary with env isolation.
///
/// Clears all `MESHGATE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn meshgate_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("meshgate");
    cmd.env("HOME", "/tmp/meshgate-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/meshgate-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("MESHGATE_CONFIG")
        .env_remove("MESHGATE_HOST")
        .env_remove("MESHGATE_OUTPUT")
        .env_remove("MESHGATE_TIMEOUT")
        .env_remove("MESHGATE_GATEWAY__HOST")
        .env_remove("MESHGATE_GATEWAY__SERIAL");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const DEVICES: &str = r#"
[[devices]]
board = "AA:BB"
button = 1
name = "Lamp"
room = "Hall"

[[devices]]
board = "AA:BB"
sub_address = 18
name = "Ceiling Fan"
class = "fan"
initial_state = 50
"#;

/// Write a config with the sample devices and an optional gateway section.
fn write_config(dir: &Path, gateway: &str) -> PathBuf {
    let file = dir.join("config.toml");
    std::fs::write(&file, format!("{gateway}\n{DEVICES}")).unwrap();
    file
}

fn gateway_section(server: &MockServer) -> String {
    let port = server.address().port();
    format!("[gateway]\nhost = \"127.0.0.1\"\ncommand_port = {port}\ntimeout = 2\n")
}

fn closed_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = meshgate_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    meshgate_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("discover")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("speed")),
    );
}

#[test]
fn test_version_flag() {
    meshgate_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshgate"));
}

#[test]
fn test_invalid_subcommand() {
    let output = meshgate_cmd().arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("foobar"), "Expected error mentioning foobar:\n{text}");
}

#[test]
fn test_speed_requires_level() {
    meshgate_cmd()
        .args(["speed", "Ceiling Fan"])
        .assert()
        .code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    meshgate_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    meshgate_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("custom.toml");
    meshgate_cmd()
        .args(["config", "path", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("nested").join("config.toml");

    meshgate_cmd()
        .args(["config", "init", "--host", "192.168.1.40", "--serial", "TW-0042"])
        .arg("--config")
        .arg(&file)
        .assert()
        .success();

    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("host = \"192.168.1.40\""), "{written}");
    assert!(written.contains("serial = \"TW-0042\""), "{written}");

    meshgate_cmd()
        .args(["config", "init"])
        .arg("--config")
        .arg(&file)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("--force"));

    meshgate_cmd()
        .args(["config", "init", "--force"])
        .arg("--config")
        .arg(&file)
        .assert()
        .success();
    let rewritten = std::fs::read_to_string(&file).unwrap();
    assert!(!rewritten.contains("192.168.1.40"), "{rewritten}");
}

#[test]
fn test_config_init_rejects_bad_host() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    meshgate_cmd()
        .args(["config", "init", "--host", "not a host!"])
        .arg("--config")
        .arg(&file)
        .assert()
        .code(2);
    assert!(!file.exists());
}

#[test]
fn test_config_show_json_includes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    meshgate_cmd()
        .args(["config", "show", "-o", "json", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"command_port\": 8900")
                .and(predicate::str::contains("\"status_base\": 17"))
                .and(predicate::str::contains("Ceiling Fan")),
        );
}

#[test]
fn test_config_show_applies_host_flag() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    meshgate_cmd()
        .args(["config", "show", "--host", "10.0.0.7", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("host = \"10.0.0.7\""));
}

// ── Devices (configuration only) ────────────────────────────────────

#[test]
fn test_devices_list_plain() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    meshgate_cmd()
        .args(["devices", "list", "-o", "plain", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout("AA:BB_17\nAA:BB_18\n");
}

#[test]
fn test_devices_list_table() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    meshgate_cmd()
        .args(["devices", "list", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Lamp")
                .and(predicate::str::contains("Hall"))
                .and(predicate::str::contains("50% (speed 2)")),
        );
}

#[test]
fn test_devices_get_by_name_json() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    let output = meshgate_cmd()
        .args(["devices", "get", "ceiling fan", "-o", "json-compact", "--config"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["key"], "AA:BB_18");
    assert_eq!(value["class"], "fan");
    assert_eq!(value["speed"], 2);
}

#[test]
fn test_devices_get_unknown_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), "");
    meshgate_cmd()
        .args(["devices", "get", "Garage", "--config"])
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("devices list"));
}

#[test]
fn test_duplicate_devices_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    std::fs::write(
        &file,
        "[[devices]]\nboard = \"AA:BB\"\nsub_address = 17\nname = \"A\"\n\
         [[devices]]\nboard = \"AA:BB\"\nbutton = 1\nname = \"B\"\n",
    )
    .unwrap();
    meshgate_cmd()
        .args(["devices", "list", "--config"])
        .arg(&file)
        .assert()
        .failure();
}

// ── Gateway commands ────────────────────────────────────────────────

#[test]
fn test_on_unknown_device_fails_before_network() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = format!("[gateway]\nhost = \"127.0.0.1\"\ncommand_port = {}\n", closed_port());
    let file = write_config(dir.path(), &gateway);
    meshgate_cmd()
        .args(["on", "Garage", "--config"])
        .arg(&file)
        .assert()
        .code(4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_on_sends_operate_and_prints_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/operate"))
        .and(body_string_contains("\"subid\":17"))
        .and(body_string_contains("\"cmd\":1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), &gateway_section(&server));
    let output = meshgate_cmd()
        .args(["on", "Lamp", "-o", "json-compact", "--config"])
        .arg(&file)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["state"], 1);
    assert_eq!(value["on"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_speed_maps_to_percentage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/operate"))
        .and(body_string_contains("\"subid\":18"))
        .and(body_string_contains("\"cmd\":100"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), &gateway_section(&server));
    meshgate_cmd()
        .args(["speed", "AA:BB_18", "4", "-o", "plain", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout("AA:BB_18\t100\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_command_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/operate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("error"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), &gateway_section(&server));
    meshgate_cmd()
        .args(["off", "Ceiling Fan", "--config"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("rejected"));
}

#[test]
fn test_invalid_speed_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = format!("[gateway]\nhost = \"127.0.0.1\"\ncommand_port = {}\n", closed_port());
    let file = write_config(dir.path(), &gateway);
    meshgate_cmd()
        .args(["speed", "Ceiling Fan", "7", "--config"])
        .arg(&file)
        .assert()
        .code(2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_broadcasts_getstatus() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/operate"))
        .and(body_string_contains("getstatus"))
        .and(body_string_contains("ffffffffffff"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), &gateway_section(&server));
    meshgate_cmd()
        .args(["status", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1"));
}

#[test]
fn test_status_unreachable_gateway_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = format!(
        "[gateway]\nhost = \"127.0.0.1\"\ncommand_port = {}\ntimeout = 2\n",
        closed_port()
    );
    let file = write_config(dir.path(), &gateway);
    meshgate_cmd()
        .args(["status", "--config"])
        .arg(&file)
        .assert()
        .code(7);
}
