//! Integration tests for the `mywant` CLI against a real in-process server.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_mywant")
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..200 {
        if client.get(format!("{base_url}/health")).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never became healthy at {base_url}");
}

#[tokio::test]
async fn start_serves_health_until_killed() {
    let port = 18080;
    let base_url = format!("http://127.0.0.1:{port}");

    let mut child = Command::new(bin())
        .args(["start", "--bind", &format!("127.0.0.1:{port}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn mywant start");

    wait_for_health(&base_url).await;

    let health = reqwest::get(format!("{base_url}/health")).await.unwrap();
    assert!(health.status().is_success());

    child.kill().unwrap();
    let _ = child.wait();
}

#[test]
fn wants_create_rejects_a_missing_file() {
    let output = Command::new(bin())
        .args(["--server", "http://127.0.0.1:1", "wants", "create", "/no/such/file.json"])
        .output()
        .expect("failed to run mywant wants create");
    assert!(!output.status.success());
}

#[test]
fn recipes_create_accepts_a_yaml_file() {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(file, "name: counter\nparameters:\n  count: 10\ntemplate:\n  wants: []\n").unwrap();

    // No server is reachable on this port, so the command must fail at the
    // HTTP call rather than while parsing the YAML file itself.
    let output = Command::new(bin())
        .args([
            "--server",
            "http://127.0.0.1:1",
            "recipes",
            "create",
            file.path().to_str().unwrap(),
        ])
        .output()
        .expect("failed to run mywant recipes create");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}
