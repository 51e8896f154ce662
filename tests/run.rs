use std::path::Path;
use std::process::{Command, Output};

const ENV_VARS: &[&str] = &[
    "ARGOCD_SERVER_URL",
    "ARGOCD_PUBLIC_URL",
    "ARGOCD_TOKEN",
    "ARGOCD_VERSION",
    "GITHUB_TOKEN",
    "GITHUB_REPOSITORY",
    "GITHUB_EVENT_PATH",
];

fn appdiff(dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_appdiff"));
    cmd.args(args).current_dir(dir);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.output().unwrap()
}

#[test]
fn run_without_server_url_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = appdiff(dir.path(), &["run"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("server URL not set"), "stderr: {stderr}");
}

#[test]
fn run_without_token_fails_before_any_network_call() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".appdiff.toml"),
        "[argocd]\nserver_url = \"argocd.invalid\"\n",
    )
    .unwrap();
    let output = appdiff(dir.path(), &["run"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("token not set"), "stderr: {stderr}");
}

#[test]
fn run_outside_actions_without_pr_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = appdiff(
        dir.path(),
        &[
            "run",
            "--argocd-server-url",
            "argocd.invalid",
            "--argocd-token",
            "s3cr3t",
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GITHUB_REPOSITORY not set"), "stderr: {stderr}");
    assert!(!stderr.contains("s3cr3t"));
}

#[test]
fn missing_explicit_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = appdiff(dir.path(), &["run", "--config", "nope.toml"]);
    assert!(!output.status.success());
}

#[test]
fn invalid_pr_reference_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = appdiff(
        dir.path(),
        &[
            "run",
            "--argocd-server-url",
            "argocd.invalid",
            "--argocd-token",
            "t",
            "--pr",
            "acme-deploy-42",
            "--sha",
            "abc",
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid PR reference"), "stderr: {stderr}");
}
