//! End-to-end tests of the `raindrop-shell` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary isolated from the caller's environment and any `.env` file.
fn shell(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("raindrop-shell").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RAINDROP_TOKEN")
        .env_remove("RAINDROP_REFRESH_TOKEN")
        .env_remove("RAINDROP_TOKEN_FILE")
        .env_remove("RAINDROP_API_URL")
        .env_remove("RAINDROP_STATE_FILE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_environment_variables() {
    let dir = TempDir::new().unwrap();
    shell(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RAINDROP_TOKEN"))
        .stdout(predicate::str::contains("--no-cache"));
}

#[test]
fn test_missing_token_fails_before_network() {
    let dir = TempDir::new().unwrap();
    shell(&dir)
        .arg("--no-cache")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no access token"));
}

#[test]
fn test_invalid_api_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    shell(&dir)
        .args(["--token", "t", "--no-cache", "--api-url", "ftp://example.test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must use http or https"));
}

#[test]
fn test_unreachable_server_fails_login() {
    let dir = TempDir::new().unwrap();
    shell(&dir)
        .args(["--token", "t", "--no-cache", "--timeout", "2", "--api-url", "http://127.0.0.1:9/rest/v1"])
        .write_stdin("exit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to log into Raindrop.io"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_searches_and_exits_cleanly() {
    let server = MockServer::start().await;
    let ok = |body: serde_json::Value| ResponseTemplate::new(200).set_body_json(body);

    Mock::given(method("GET"))
        .and(path("/rest/v1/user"))
        .respond_with(ok(json!({"user": {"_id": 1, "fullName": "Ada"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/collections"))
        .respond_with(ok(json!({"items": [{"_id": 10, "title": "Books", "count": 1}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/collections/childrens"))
        .respond_with(ok(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/user/stats"))
        .respond_with(ok(json!({"items": [], "meta": {"changedBookmarksDate": "2024-05-01T00:00:00Z"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tags"))
        .respond_with(ok(json!({"items": [{"_id": "rust", "count": 1}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrops/10"))
        .respond_with(ok(json!({"items": [
            {"_id": 5, "title": "The Rust Book", "link": "https://doc.rust-lang.org/book/", "collection": {"$id": 10}, "tags": ["rust"]}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("state.json");
    let api_url = format!("{}/rest/v1", server.uri());
    let state_arg = state_file.display().to_string();

    let (assert, dir) = tokio::task::spawn_blocking(move || {
        let assert = shell(&dir)
            .args(["--token", "t", "--api-url", &api_url, "--state-file", &state_arg])
            .write_stdin("search\n*\nBooks\n1\nback\nq\nexit\n")
            .assert();
        (assert, dir)
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("The Rust Book"))
        .stdout(predicate::str::contains("https://doc.rust-lang.org/book/"))
        .stdout(predicate::str::contains("Thanks"));
    assert!(state_file.exists());
    drop(dir);
}
