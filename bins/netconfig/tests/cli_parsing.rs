//! CLI tests for the netconfig command.
//!
//! Nothing here needs root privileges or touches the running system.

use assert_cmd::Command;
use predicates::prelude::*;

fn netconfig_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_netconfig"))
}

#[test]
fn test_help() {
    netconfig_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Router network configuration"));
}

#[test]
fn test_apply_help_lists_dry_run() {
    netconfig_cmd()
        .args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_invalid_timeout() {
    netconfig_cmd()
        .args(["apply", "--timeout", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_ruleset_listing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("portforwardings.json"),
        r#"{"forwardings":[
            {"port":"8080","dest_addr":"192.168.42.23","dest_port":"9999"},
            {"proto":"udp","port":"53","dest_addr":"192.168.42.99","dest_port":"53"}
        ]}"#,
    )
    .unwrap();

    netconfig_cmd()
        .args(["ruleset", "-n", "--config-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "iifname \"uplink0\" tcp dport 8080 dnat to 192.168.42.23:9999",
        ))
        .stdout(predicate::str::contains("table ip6 filter {"));
}

#[test]
fn test_ruleset_rejects_range_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("portforwardings.json"),
        r#"{"forwardings":[{"port":"8040-8060","dest_addr":"192.168.42.99","dest_port":"8040-8050"}]}"#,
    )
    .unwrap();

    netconfig_cmd()
        .args(["ruleset", "--config-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("load configuration"))
        .stderr(predicate::str::contains("cannot be mapped"));
}

#[test]
fn test_apply_without_interfaces_fails() {
    let dir = tempfile::tempdir().unwrap();
    netconfig_cmd()
        .args(["apply", "--dry-run", "--config-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
