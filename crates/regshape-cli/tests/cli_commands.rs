use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn regshape(helper_dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_regshape"));
    cmd.env(
        "REGSHAPE_HELPER_PREFIX",
        format!("{}/credential-", helper_dir.path().display()),
    )
    .env("REGSHAPE_CONFIG", helper_dir.path().join("config.json"))
    .env("DOCKER_CONFIG", helper_dir.path())
    .env_remove("REGSHAPE_CREDENTIAL_STORE")
    .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    regshape(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("credentials"));
}

#[test]
fn test_logout_missing_helper_exits_with_store_code() {
    let dir = TempDir::new().unwrap();
    regshape(&dir)
        .args(["logout", "registry.example", "--store", "absent"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("credential-absent"));
}

#[test]
fn test_invalid_client_config_exits_with_config_code() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

    regshape(&dir)
        .args(["credentials", "list"])
        .assert()
        .code(2);
}

#[cfg(unix)]
#[test]
fn test_credentials_list_json() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let helper = dir.path().join("credential-fake");
    std::fs::write(
        &helper,
        "#!/bin/sh\nprintf '{\"registry.example\":\"alice\"}'\n",
    )
    .unwrap();
    std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::write(dir.path().join("config.json"), r#"{"credsStore":"fake"}"#).unwrap();

    let output = regshape(&dir)
        .args(["credentials", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value, serde_json::json!({"registry.example": "alice"}));
}
