#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use cxorb::orb::connect;
use cxorb::transport::Endpoint;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/cxorb-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_server(path: &Path, timeout: Duration) {
    let endpoint = Endpoint::Unix(path.to_path_buf());
    let start = Instant::now();
    loop {
        if connect(&endpoint).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("server did not come up");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_server(sock_path: &Path, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_cxorb"))
        .args(["--log-level", "error", "--format", "json", "serve"])
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start");
    wait_for_server(sock_path, Duration::from_secs(3));
    child
}

fn cxorb(args: &[&str], sock_path: &Path) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cxorb"));
    cmd.args(["--log-level", "error", "--format", "json"]);
    cmd.arg(args[0]).arg(sock_path).args(&args[1..]);
    cmd.output().expect("client command should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

fn stop(mut child: Child, dir: &Path) {
    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn toggle_then_read_round_trip() {
    let dir = unique_temp_dir("toggle");
    let sock_path = dir.join("digio.sock");
    let child = spawn_server(&sock_path, &[]);

    let read = cxorb(&["read", "4"], &sock_path);
    assert!(read.status.success());
    assert_eq!(json_lines(&read)[0]["value"], false);

    let toggle = cxorb(&["toggle", "4"], &sock_path);
    assert!(toggle.status.success());
    let reading = &json_lines(&toggle)[0];
    assert_eq!(reading["action"], "toggle");
    assert_eq!(reading["target"], "0x00020000");
    assert_eq!(reading["value"], true);

    let read = cxorb(&["read", "4"], &sock_path);
    assert_eq!(json_lines(&read)[0]["value"], true);

    let clear = cxorb(&["clear", "4"], &sock_path);
    assert_eq!(json_lines(&clear)[0]["value"], false);

    stop(child, &dir);
}

#[test]
fn width_reports_configured_bits() {
    let dir = unique_temp_dir("width");
    let sock_path = dir.join("digio.sock");
    let child = spawn_server(&sock_path, &["--bits", "12"]);

    let output = cxorb(&["width", "--port", "in"], &sock_path);
    assert!(output.status.success());
    let reading = &json_lines(&output)[0];
    assert_eq!(reading["width"], 12);
    assert_eq!(reading["target"], "0x00010000");
    assert!(reading.get("bit").is_none());

    stop(child, &dir);
}

#[test]
fn demo_runs_the_client_sequence() {
    let dir = unique_temp_dir("demo");
    let sock_path = dir.join("digio.sock");
    let child = spawn_server(&sock_path, &[]);

    let output = cxorb(&["demo", "--bit", "1"], &sock_path);
    assert!(output.status.success());
    let readings = json_lines(&output);
    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0]["width"], 32);
    assert_eq!(readings[1]["value"], false);
    assert_eq!(readings[2]["value"], true);

    stop(child, &dir);
}

#[test]
fn unknown_instance_is_usage_error() {
    let dir = unique_temp_dir("instance");
    let sock_path = dir.join("digio.sock");
    let child = spawn_server(&sock_path, &[]);

    let output = cxorb(&["read", "0", "--instance", "9"], &sock_path);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no object registered under 0x00010009"));

    stop(child, &dir);
}

#[test]
fn missing_server_times_out_with_124() {
    let missing = PathBuf::from(format!(
        "/tmp/cxorb-cli-missing-{}-{}.sock",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));

    let output = cxorb(&["read", "1", "--timeout", "300ms"], &missing);
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_cxorb"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("cxorb {}", env!("CARGO_PKG_VERSION")));
}
