use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn write_config(root: &Path, body: &str) {
    fs::create_dir_all(root.join(".devcontainer")).expect("mkdir");
    fs::write(root.join(".devcontainer/devcontainer.json"), body).expect("write config");
}

fn devcontainer_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("devcontainer"))
}

#[test]
fn read_configuration_with_no_features_succeeds_offline() {
    let td = tempdir().expect("tempdir");
    write_config(td.path(), r#"{"image": "ubuntu:22.04"}"#);

    devcontainer_cmd()
        .arg("--workspace-folder")
        .arg(td.path())
        .arg("read-configuration")
        .assert()
        .success()
        .stdout(contains("\"outcome\":\"success\""))
        .stdout(contains("\"workspaceFolder\""));
}

#[test]
fn read_configuration_missing_config_fails_with_config_not_found() {
    let td = tempdir().expect("tempdir");

    devcontainer_cmd()
        .arg("--workspace-folder")
        .arg(td.path())
        .arg("read-configuration")
        .assert()
        .failure()
        .code(1)
        .stdout(contains("\"outcome\":\"error\""));
}

#[test]
fn exec_without_container_id_fails_with_bad_config() {
    let td = tempdir().expect("tempdir");
    write_config(td.path(), r#"{"image": "ubuntu:22.04"}"#);

    devcontainer_cmd()
        .arg("--workspace-folder")
        .arg(td.path())
        .arg("exec")
        .arg("--")
        .arg("true")
        .assert()
        .failure()
        .code(1)
        .stdout(contains("exec requires --container-id"));
}
