//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const AGENT_OUTPUT: &str = "\
<<<cpu>>>
0.88 0.83 0.87 2/1748 21050 8
<<<if>>>
2 eth0 6 1000000000 1 1000 10 0 2000 20 0
<<<lnx_if>>>
eth0: 1093 12 0 0 0 0 0 0 2145 20 0 0 0 0 0 0
[eth0]
Speed: 1000Mb/s
Link detected: yes
<<<juniper_cpu_util:sep(124)>>>
Routing Engine 0|95
<<<local>>>
0 foo - bar
";

fn checker(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_checker"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute checker")
}

fn write_agent_output(dir: &TempDir, text: &str) -> String {
    let path = dir.path().join("agent.txt");
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = checker(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("sections"), "Should show sections command");
    assert!(stdout.contains("discover"), "Should show discover command");
    assert!(stdout.contains("check"), "Should show check command");
}

#[test]
fn test_sections_reports_superseded_and_unregistered() {
    let dir = TempDir::new().unwrap();
    let input = write_agent_output(&dir, AGENT_OUTPUT);
    let output = checker(&["--format", "json", "sections", &input]);
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let status = |name: &str| {
        rows.as_array()
            .unwrap()
            .iter()
            .find(|row| row["section"] == name)
            .map(|row| row["status"].as_str().unwrap().to_string())
            .unwrap()
    };
    assert_eq!(status("lnx_if"), "parsed");
    assert_eq!(status("if"), "superseded");
    assert_eq!(status("local"), "unregistered");
    assert_eq!(status("cpu"), "parsed");
}

#[test]
fn test_discover_writes_services() {
    let dir = TempDir::new().unwrap();
    let input = write_agent_output(&dir, AGENT_OUTPUT);
    let services_path = dir.path().join("services.json");
    let output = checker(&[
        "--format",
        "json",
        "discover",
        &input,
        "--output",
        &path_str(&services_path),
    ]);
    assert!(output.status.success());

    let services: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&services_path).unwrap()).unwrap();
    let descriptions: Vec<&str> = services
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["description"].as_str().unwrap())
        .collect();
    assert_eq!(
        descriptions,
        vec!["CPU load", "Interface eth0", "Routing Engine CPU Routing Engine 0"]
    );
}

#[test]
fn test_check_exit_code_is_worst_state() {
    let dir = TempDir::new().unwrap();
    let input = write_agent_output(&dir, AGENT_OUTPUT);
    let state_file = path_str(&dir.path().join("values.json"));

    // Juniper at 95% is CRIT; the interface is still pending
    let output = checker(&["--format", "json", "check", &input, "--state-file", &state_file, "--now", "1000"]);
    assert_eq!(output.status.code(), Some(2));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let interface = reports
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["service"]["check_name"] == "interfaces")
        .unwrap();
    assert_eq!(interface["outcome"]["outcome"], "pending");
    assert!(interface["state"].is_null());
}

#[test]
fn test_check_rates_on_second_run() {
    let dir = TempDir::new().unwrap();
    let state_file = path_str(&dir.path().join("values.json"));
    let first = write_agent_output(
        &dir,
        "<<<if>>>\n2 eth0 6 1000000000 1 0 0 0 0 0 0\n",
    );
    let output = checker(&["check", &first, "--state-file", &state_file, "--now", "100"]);
    assert_eq!(output.status.code(), Some(0));

    let second = write_agent_output(
        &dir,
        "<<<if>>>\n2 eth0 6 1000000000 1 1000000 1000 0 2000000 2000 0\n",
    );
    let output = checker(&[
        "--format",
        "json",
        "check",
        &second,
        "--state-file",
        &state_file,
        "--now",
        "110",
    ]);
    assert_eq!(output.status.code(), Some(0));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let metrics = reports[0]["outcome"]["metrics"].as_array().unwrap();
    let inbound = metrics.iter().find(|m| m["name"] == "in").unwrap();
    assert_eq!(inbound["value"], 100000.0);
}

#[test]
fn test_check_service_filter_and_config_rules() {
    let dir = TempDir::new().unwrap();
    let input = write_agent_output(&dir, AGENT_OUTPUT);
    let config_path = dir.path().join("checker.json");
    std::fs::write(
        &config_path,
        r#"{"host_name": "re0", "rules": {"juniper_cpu_util": {"levels": {"upper": [96.0, 99.0]}}}}"#,
    )
    .unwrap();
    let state_file = path_str(&dir.path().join("values.json"));

    let output = checker(&[
        "--config",
        &path_str(&config_path),
        "check",
        &input,
        "--state-file",
        &state_file,
        "--service",
        "juniper_cpu_util",
        "--now",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Routing Engine CPU Routing Engine 0"));
    assert!(!stdout.contains("CPU load"));
}

#[test]
fn test_missing_input_fails() {
    let output = checker(&["check", "/nonexistent/agent.txt"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read agent output"));
}
