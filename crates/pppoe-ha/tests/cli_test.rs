//! Exit codes of the installed binary

use std::path::Path;
use std::process::{Command, Output};

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("pppoe-ha.yaml");
    let yaml = format!(
        r#"
suppression:
  dir: {dir}
  window: 2m

commands:
  ifconfig: /nonexistent/ifconfig
  pfsctl: /nonexistent/pfSctl

logging:
  level: debug
  file: {dir}/pppoe-ha.log

interfaces:
  wan: pppoe0

virtual_ips:
  vip5:
    mode: carp
    vhid: 5
"#,
        dir = dir.display()
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pppoe-ha"))
        .args(args)
        .env("PPPOE_HA_CONFIG", config)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_malformed_invocations_exit_with_usage() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    for args in [
        &[][..],
        &["dance"][..],
        &["role-event", "5"][..],
        &["role-event", "5", "INIT"][..],
        &["role-event", "wan", "MASTER"][..],
        &["reconcile", "0"][..],
    ] {
        let output = run(&config, args);
        assert_eq!(output.status.code(), Some(1), "args: {args:?}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("usage:"), "args: {args:?}, stderr: {stderr}");
    }
}

#[test]
fn test_reconcile_without_mapping_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["reconcile", "5"]);
    assert_eq!(output.status.code(), Some(0));

    let output = run(&config, &["$RECONCILE_QUIET"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_unresolvable_carp_interface_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["carp", "carp3", "MASTER"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_successfully() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("reconcile"));
}

#[test]
fn test_missing_explicit_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&dir.path().join("missing.yaml"), &["reconcile", "5"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration error"));
}

#[test]
fn test_logs_go_to_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["reconcile", "5"]);
    assert_eq!(output.status.code(), Some(0));

    let log = std::fs::read_to_string(dir.path().join("pppoe-ha.log")).unwrap();
    assert!(log.contains("Reconcile finished"), "log: {log}");
}
