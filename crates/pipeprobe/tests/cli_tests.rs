//! End-to-end tests of the `pipeprobe` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeprobe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pipeprobe"));
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GITLAB_TOKEN")
        .env_remove("GITLAB_URL")
        .env_remove("GITHUB_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_all_subcommands() {
    pipeprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("recon")
                .and(predicate::str::contains("run"))
                .and(predicate::str::contains("glrecon"))
                .and(predicate::str::contains("glrun")),
        );
}

#[test]
fn missing_token_is_a_usage_error() {
    pipeprobe()
        .args(["run", "--target", "acme/widgets", "--workflow-file", "x.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--auth"));
}

#[test]
fn malformed_target_is_a_usage_error() {
    pipeprobe()
        .args(["run", "-a", "ghp_x", "-t", "widgets", "-w", "x.yaml"])
        .assert()
        .code(2);
}

#[test]
fn missing_pipeline_file_fails_before_any_network_call() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("nope.yml");
    pipeprobe()
        .args(["glrun", "-a", "glpat", "-t", "group/project", "--json", "-p"])
        .arg(&missing)
        .args(["--gitlab-url", "http://127.0.0.1:9"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains(r#""code":"config""#));
}

async fn gitlab_server(user_status: u16) -> MockServer {
    let server = MockServer::start().await;
    let user = if user_status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({
            "username": "root",
            "id": 1,
            "name": "Administrator",
            "email": "admin@example.inc",
            "is_admin": false,
        }))
    } else {
        ResponseTemplate::new(user_status).set_body_json(json!({"message": "401 Unauthorized"}))
    };
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(header("PRIVATE-TOKEN", "glpat-e2e"))
        .respond_with(user)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "path_with_namespace": "ops/deploy",
                "visibility": "private",
                "archived": false,
                "permissions": {"project_access": {"access_level": 30}},
            },
        ])))
        .mount(&server)
        .await;
    server
}

async fn run_blocking(mut cmd: Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn glrecon_json_reports_superuser_as_admin() {
    let server = gitlab_server(200).await;
    let mut cmd = pipeprobe();
    cmd.args(["--json", "glrecon", "--auth", "glpat-e2e", "--gitlab-url"])
        .arg(server.uri());

    let output = run_blocking(cmd).await;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let envelope: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["data"]["identity"]["username"], "root");
    assert_eq!(envelope["data"]["is_admin"], true);
    assert_eq!(envelope["data"]["privilege"], "Admin");
    assert_eq!(envelope["data"]["targets"][0]["full_path"], "ops/deploy");
    assert_eq!(envelope["data"]["targets"][0]["access_summary"]["kind"], "admin_all");
}

#[tokio::test(flavor = "multi_thread")]
async fn glrecon_table_output() {
    let server = gitlab_server(200).await;
    let mut cmd = pipeprobe();
    cmd.args(["glrecon", "--superuser", "", "-a", "glpat-e2e", "--gitlab-url"])
        .arg(format!("{}/api/v4", server.uri()));

    let output = run_blocking(cmd).await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("GitLab Token/Account Info"));
    assert!(stdout.contains("| Is Admin  | false"));
    assert!(stdout.contains("| ops/deploy | private    | Developer (30) |"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_token_exits_with_failure_code() {
    let server = gitlab_server(401).await;
    let mut cmd = pipeprobe();
    cmd.args(["glrecon", "-a", "glpat-e2e", "--gitlab-url"])
        .arg(server.uri());

    let output = run_blocking(cmd).await;
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("401 Unauthorized"), "stderr: {stderr}");
    assert!(!stderr.contains("glpat-e2e"));
}
