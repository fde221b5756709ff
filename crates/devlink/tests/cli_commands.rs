#![cfg(feature = "cli")]

use std::net::TcpListener;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

const PING_FRAME: &str = "AA 55 04 00 01 00 00 20 55 AA";

fn devlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devlink"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("devlink should run")
}

#[test]
fn version_prints_package_version() {
    let output = devlink(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("devlink {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn encode_ping_matches_wire_layout() {
    let output = devlink(&["--format", "pretty", "encode", "--cmd", "0x01", "--seq", "0"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), PING_FRAME);
}

#[test]
fn decode_reports_command_and_details() {
    let output = devlink(&["--format", "json", "decode", PING_FRAME]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("json output");
    assert_eq!(value["command_name"], "PING");
    assert_eq!(value["seq"], 0);
    assert_eq!(value["payload_size"], 0);
}

#[test]
fn decode_nack_includes_reason() {
    let encoded = devlink(&[
        "--format", "pretty", "encode", "--cmd", "0x91", "--seq", "2", "--payload", "0101",
    ]);
    assert!(encoded.status.success());
    let hex = String::from_utf8_lossy(&encoded.stdout).trim().to_string();

    let output = devlink(&["--format", "json", "decode", &hex]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("parameter error"));
}

#[test]
fn decode_corrupt_frame_is_invalid_data() {
    let output = devlink(&["decode", "AA 55 04 00 01 00 00 21 55 AA"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("checksum"));
}

#[test]
fn decode_bad_hex_is_usage_error() {
    let output = devlink(&["decode", "AA5"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn oversized_payload_is_invalid_data() {
    let payload = "00".repeat(8183);
    let output = devlink(&["encode", "--cmd", "1", "--payload", &payload]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn loopback_serve_answers_test_script() {
    let output = devlink(&[
        "--format",
        "json",
        "serve",
        "--transport",
        "loopback",
        "--seed",
        "7",
        "--duration-ms",
        "300",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is json"))
        .collect();
    let names: Vec<&str> = lines
        .iter()
        .filter_map(|v| v["command_name"].as_str())
        .collect();
    assert_eq!(&names[..5], &["PONG", "DEVICE_INFO_RESPONSE", "ACK", "ACK", "ACK"]);
    assert_eq!(lines[0]["details"]["device_id"], "0x11223344aabbccdd");

    let stats = lines.last().expect("stats line");
    assert_eq!(stats["transport"], "loopback");
    assert_eq!(stats["frames_received"], 5);
}

#[test]
fn tcp_serve_without_host_stops_at_duration() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let bind = format!("127.0.0.1:{port}");

    let started = Instant::now();
    let output = devlink(&[
        "--format",
        "json",
        "serve",
        "--transport",
        "tcp",
        "--bind",
        &bind,
        "--duration-ms",
        "200",
    ]);
    assert!(output.status.success());
    assert!(started.elapsed() < Duration::from_secs(10));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stats: serde_json::Value =
        serde_json::from_str(stdout.trim().lines().last().expect("stats line")).unwrap();
    assert_eq!(stats["transport"], "tcp");
    assert_eq!(stats["iterations"], 0);
}

#[test]
fn missing_config_file_is_usage_error() {
    let output = devlink(&[
        "serve",
        "--transport",
        "loopback",
        "--config",
        "/nonexistent/devlink-session.json",
        "--duration-ms",
        "10",
    ]);
    assert_eq!(output.status.code(), Some(64));
}
