use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const POLICIES: &str = r#"{
  "repositoryName": "hadoopdev",
  "policies": [
    {
      "resource": "/demo/data",
      "recursive": true,
      "enabled": true,
      "auditEnabled": true,
      "permissions": [
        {"accessTypes": ["read", "write"], "users": ["guest"], "groups": ["sales"]}
      ]
    }
  ]
}"#;

/// Create an agent deployment with a file-backed policy authority
fn create_deployment() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::write(root.join("authority.json"), POLICIES).unwrap();
    fs::write(root.join("users.csv"), "alice,grpA,grpB\nbob,grpA\n").unwrap();
    write_config(root, "");

    temp_dir
}

fn write_config(root: &Path, extra: &str) {
    fs::write(
        root.join("polagent.yaml"),
        format!(
            "policy_url: file://{}\nrefresh_interval_secs: 30\ncache_file: cache/policy.json\n{}",
            root.join("authority.json").display(),
            extra
        ),
    )
    .unwrap();
}

fn polagent(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("polagent").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("POLAGENT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    polagent(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("policy enforcement agent"))
        .stdout(predicate::str::contains("usersync"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    polagent(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("polagent"));
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    polagent(&dir)
        .args(["config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("polagent.yaml"));
}

#[test]
fn test_invalid_interval_fails() {
    let dir = create_deployment();
    fs::write(
        dir.path().join("polagent.yaml"),
        "policy_url: file:///tmp/p.json\nrefresh_interval_secs: 0\ncache_file: c.json\n",
    )
    .unwrap();

    polagent(&dir)
        .args(["config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refresh_interval_secs"));
}

#[test]
fn test_config_show_json() {
    let dir = create_deployment();
    polagent(&dir)
        .args(["config", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"refresh_interval_secs\": 30"))
        .stdout(predicate::str::contains("policy.json"));
}

#[test]
fn test_config_from_env_var() {
    let dir = create_deployment();
    fs::rename(
        dir.path().join("polagent.yaml"),
        dir.path().join("elsewhere.yaml"),
    )
    .unwrap();

    polagent(&dir)
        .env("POLAGENT_CONFIG", dir.path().join("elsewhere.yaml"))
        .args(["config", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy_url"));
}

#[test]
fn test_run_once_populates_cache() {
    let dir = create_deployment();

    polagent(&dir)
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policies updated for"));

    let cached = fs::read_to_string(dir.path().join("cache/policy.json")).unwrap();
    assert!(cached.contains("\"repositoryName\": \"hadoopdev\""));

    // Same policies again: nothing to update
    polagent(&dir)
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policies unchanged"));
}

#[test]
fn test_run_once_unreachable_authority_fails() {
    let dir = create_deployment();
    fs::remove_file(dir.path().join("authority.json")).unwrap();

    polagent(&dir)
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Policy refresh"));
}

#[test]
fn test_cache_show_and_clear() {
    let dir = create_deployment();

    polagent(&dir)
        .args(["cache", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No policy cache"));

    polagent(&dir).args(["run", "--once"]).assert().success();

    polagent(&dir)
        .args(["cache", "show", "--format", "json", "--policies"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"policy_count\": 1"))
        .stdout(predicate::str::contains("/demo/data"));

    polagent(&dir)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    assert!(!dir.path().join("cache/policy.json").exists());
}

#[test]
fn test_usersync_reads_csv() {
    let dir = create_deployment();
    polagent(&dir)
        .args(["usersync", "users.csv", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"alice\""))
        .stdout(predicate::str::contains("\"grpB\""));
}

#[test]
fn test_usersync_custom_delimiter_text() {
    let dir = create_deployment();
    fs::write(dir.path().join("users.txt"), "carol;ops;dev\n").unwrap();

    polagent(&dir)
        .args(["usersync", "users.txt", "--delimiter", ";"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ops, dev"))
        .stdout(predicate::str::contains("Total users: 1"));
}

#[test]
fn test_usersync_verbose_logs_users_and_groups() {
    let dir = create_deployment();
    polagent(&dir)
        .args(["-v", "usersync", "users.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("USER: alice"))
        .stderr(predicate::str::contains("GROUP: grpB"));

    // Quiet by default
    polagent(&dir)
        .args(["usersync", "users.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("USER: alice").not());
}

#[test]
fn test_usersync_missing_file_fails() {
    let dir = create_deployment();
    polagent(&dir)
        .args(["usersync", "absent.csv"])
        .assert()
        .failure();
}

#[test]
fn test_tls_check_without_truststore_fails() {
    let dir = create_deployment();
    polagent(&dir)
        .args(["tls", "check", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TLS context could not be initialized"))
        .stdout(predicate::str::contains("mutual").not());
}

#[test]
fn test_tls_check_missing_truststore_fails() {
    let dir = create_deployment();
    write_config(
        dir.path(),
        "ssl:\n  truststore: missing.p12\n  truststore_credential_file: creds.json\n",
    );
    fs::write(
        dir.path().join("creds.json"),
        r#"{"sslTrustStore": "changeit"}"#,
    )
    .unwrap();

    polagent(&dir)
        .args(["tls", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TLS context could not be initialized"));
}
