use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG: &str = r#"
repos = ["org/repo1"]

[[members]]
username = "alice"
name = "Alice Doe"
team = "titans"

[[members]]
username = "bob"
name = "Bob Roe"
team = "ops"
"#;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("team_config.toml");
    fs::write(&path, body).unwrap();
    path
}

fn teampulse(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("teampulse").unwrap();
    cmd.current_dir(dir)
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_API_URL")
        .env_remove("START_DATE")
        .env_remove("END_DATE")
        .env_remove("RUST_LOG");
    cmd
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

#[test]
fn missing_token_fails_before_fetching() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), CONFIG);

    let out = teampulse(dir.path())
        .args(["export", "--since", "2025-01-01", "--until", "2025-01-31"])
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(stderr(&out).contains("GITHUB_TOKEN"), "stderr: {}", stderr(&out));
}

#[test]
fn inverted_window_is_rejected() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), CONFIG);

    let out = teampulse(dir.path())
        .args(["--token", "t", "--since", "2025-02-01", "--until", "2025-01-01", "export"])
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(stderr(&out).contains("is after end"), "stderr: {}", stderr(&out));
}

#[test]
fn config_without_repositories_is_rejected() {
    let dir = tempdir().unwrap();
    write_config(
        dir.path(),
        "[[members]]\nusername = \"alice\"\nname = \"Alice\"\nteam = \"titans\"\n",
    );

    let out = teampulse(dir.path())
        .args(["--token", "t", "--quarter", "2025Q1", "weekly"])
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(stderr(&out).contains("at least one repository"), "stderr: {}", stderr(&out));
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), &format!("{CONFIG}\nextra = true\n"));

    let out = teampulse(dir.path())
        .args(["--token", "t", "--quarter", "2025Q1", "export"])
        .output()
        .unwrap();

    assert!(!out.status.success());
}

async fn mock_github() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/org/repo1/commits"))
        .and(query_param("author", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "sha": "abc123",
                "html_url": "https://github.com/org/repo1/commit/abc123",
                "commit": {
                    "author": { "name": "Alice Doe", "date": "2025-01-07T08:30:00Z" },
                    "message": "fix: parser"
                },
                "author": { "login": "alice" }
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/org/repo1/commits"))
        .and(query_param("author", "bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn export_json_against_mock_api() {
    let server = mock_github().await;
    let dir = tempdir().unwrap();
    write_config(dir.path(), CONFIG);
    let uri = server.uri();
    let cwd = dir.path().to_path_buf();

    let out = tokio::task::spawn_blocking(move || {
        teampulse(&cwd)
            .env("GITHUB_TOKEN", "t")
            .args(["--api-url", uri.as_str(), "--since", "2025-01-01", "--until", "2025-01-31", "export", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    })
    .await
    .unwrap();

    let v: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["version"], 1);
    assert_eq!(v["since"], "2025-01-01");
    assert_eq!(v["until"], "2025-01-31");
    let entries = v["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["team"], "titans");
    assert_eq!(entries[0]["member_display_name"], "Alice Doe");
    assert_eq!(entries[0]["timestamp"], "2025-01-07T08:30:00Z");
    assert!(v["failures"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn report_writes_both_csv_files() {
    let server = mock_github().await;
    let dir = tempdir().unwrap();
    write_config(dir.path(), CONFIG);
    let uri = server.uri();
    let cwd = dir.path().to_path_buf();

    tokio::task::spawn_blocking(move || {
        teampulse(&cwd)
            .args(["--token", "t", "--api-url", uri.as_str(), "--quarter", "2025Q1"])
            .args(["report", "--out-dir", "out", "--json"])
            .assert()
            .success();
    })
    .await
    .unwrap();

    let out = dir.path().join("out");
    let ledger =
        fs::read_to_string(out.join("team_productivity_report_2025-01-01_2025-03-31.csv")).unwrap();
    assert_eq!(ledger.lines().count(), 2);
    assert!(ledger.contains("abc123"));

    let weekly =
        fs::read_to_string(out.join("weekly_commit_trend_2025-01-01_2025-03-31.csv")).unwrap();
    let rows: Vec<_> = weekly.lines().skip(1).collect();
    // 14 Monday-start weeks touch Q1 2025, for each of two teams
    assert_eq!(rows.len(), 28);
    assert!(rows.contains(&"titans,2025-01-06,2025-01-12,2025-W02,1"));
    assert!(rows.contains(&"ops,2025-01-06,2025-01-12,2025-W02,0"));
}

#[tokio::test(flavor = "multi_thread")]
async fn window_flags_override_quarter_and_environment() {
    let server = mock_github().await;
    let dir = tempdir().unwrap();
    write_config(dir.path(), CONFIG);
    let uri = server.uri();
    let cwd = dir.path().to_path_buf();

    let export = move |extra: &'static [&'static str]| {
        let out = teampulse(&cwd)
            .env("GITHUB_TOKEN", "t")
            .env("START_DATE", "2024-06-01")
            .env("END_DATE", "2024-06-30")
            .args(["--api-url", uri.as_str()])
            .args(extra)
            .args(["export", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice::<Value>(&out).unwrap()
    };

    let (env_only, quarter, narrowed) = tokio::task::spawn_blocking(move || {
        (
            export(&[]),
            export(&["--quarter", "2025Q1"]),
            export(&["--quarter", "2025Q1", "--since", "2025-01-06", "--until", "2025-01-12"]),
        )
    })
    .await
    .unwrap();

    assert_eq!(env_only["since"], "2024-06-01");
    assert_eq!(env_only["until"], "2024-06-30");
    assert!(env_only["entries"].as_array().unwrap().is_empty());

    assert_eq!(quarter["since"], "2025-01-01");
    assert_eq!(quarter["until"], "2025-03-31");
    assert_eq!(quarter["entries"].as_array().unwrap().len(), 1);

    assert_eq!(narrowed["since"], "2025-01-06");
    assert_eq!(narrowed["until"], "2025-01-12");
    assert_eq!(narrowed["entries"].as_array().unwrap().len(), 1);
}
