#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use unifylink::{Frame, FrameConfig};

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_unify-link"))
}

fn run_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = bin()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should accept input");
    child.wait_with_output().expect("binary should exit")
}

fn unique_capture(tag: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "unify-link-{tag}-{}-{}.bin",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, bytes).expect("capture should be writable");
    path
}

#[test]
fn version_prints_package_version() {
    let output = bin().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("unify-link {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn encode_prints_wire_hex() {
    let output = bin()
        .args([
            "encode",
            "--component",
            "1",
            "--data",
            "1",
            "--hex",
            "55555555",
            "--format",
            "pretty",
        ])
        .output()
        .expect("encode should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "a00001010400494255555555"
    );
}

#[test]
fn encode_rejects_oversized_payload() {
    let payload = "00".repeat(513);
    let output = bin()
        .args(["encode", "-c", "1", "-d", "1", "--hex", &payload])
        .output()
        .expect("encode should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_finds_frames_in_noisy_hex() {
    let output = run_with_stdin(
        &["decode", "--hex", "--format", "json"],
        b"00 11 22\na00001010400494255555555\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["component"], "MOTORS");
    assert_eq!(lines[0]["payload"], "55555555");
    assert_eq!(lines[1]["frames"], 1);
    assert_eq!(lines[1]["stats"]["transport_error_count"], 1);
}

#[test]
fn decode_of_pure_noise_is_data_invalid() {
    let output = run_with_stdin(&["decode", "--format", "json"], &[0x01, 0x02, 0x03]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn monitor_reads_capture_until_eof() {
    let config = FrameConfig::default();
    let mut capture = Vec::new();
    capture.extend_from_slice(&Frame::new(0x42, 1, vec![1, 2]).to_bytes(&config).unwrap());
    capture.extend_from_slice(
        &Frame::new(0x42, 2, vec![3])
            .with_seq(1)
            .to_bytes(&config)
            .unwrap(),
    );
    let path = unique_capture("monitor", &capture);

    let output = bin()
        .args(["monitor", "--listen-only", "--format", "json"])
        .arg(&path)
        .output()
        .expect("monitor should run");
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("final stats should print");
    let stats: serde_json::Value = serde_json::from_str(last).expect("stats should be JSON");
    assert_eq!(stats["success_count"], 2);
    assert_eq!(stats["decode_error_count"], 0);
}

#[test]
fn monitor_missing_device_is_transport_error() {
    let output = bin()
        .args(["monitor", "/nonexistent/unify-link-device", "--listen-only"])
        .output()
        .expect("monitor should run");
    assert_eq!(output.status.code(), Some(3));
}
