//! Integration tests for the graft CLI.
//!
//! Every command runs with its config and secrets redirected into a temp
//! directory, so nothing touches the real home directory.

use std::path::Path;

use assert_cmd::Command;
use graftwork::core::codec::{self, EncodedGraph};
use graftwork::core::object::{Node, Value};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "cli-test-token-0123456789";

/// Get a command for running graft in an isolated environment.
fn graft(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("graft").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env("GRAFT_CONFIG", home.join("config.toml"))
        .env("GRAFT_SECRETS_FILE", home.join("secrets.toml"))
        .env_remove("SPECKLE_TOKEN")
        .arg("--cwd")
        .arg(home)
        .arg("--no-interactive");
    cmd
}

mod basics {
    use super::*;

    #[test]
    fn help_lists_commands() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("rewrite"))
            .stdout(predicate::str::contains("auth"));
    }

    #[test]
    fn version_flag_works() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("graft"));
    }

    #[test]
    fn completion_generates_bash_script() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("graft"));
    }

    #[test]
    fn rewrite_rejects_malformed_url() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["rewrite", "not-a-url", "--field", "w", "--value", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid model URL"));
    }

    #[test]
    fn rewrite_rejects_excessive_depth() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args([
                "rewrite",
                "https://h/projects/p/models/m@v",
                "--field",
                "w",
                "--value",
                "1",
                "--max-depth",
                "100000",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exceeds the limit"));
    }
}

mod config {
    use super::*;

    #[test]
    fn set_then_get_global_value() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["config", "set", "max_depth", "5"])
            .assert()
            .success();

        graft(home.path())
            .args(["config", "get", "max_depth"])
            .assert()
            .success()
            .stdout("5\n");

        assert!(home.path().join("config.toml").exists());
    }

    #[test]
    fn local_value_overrides_global() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["config", "set", "commit_message", "global"])
            .assert()
            .success();
        graft(home.path())
            .args(["config", "set", "commit_message", "local", "--local"])
            .assert()
            .success();

        graft(home.path())
            .args(["config", "get", "commit_message"])
            .assert()
            .success()
            .stdout("local\n");
        assert!(home.path().join(".graft/config.toml").exists());
    }

    #[test]
    fn invalid_values_are_not_written() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["config", "set", "max_depth", "99999"])
            .assert()
            .failure();
        graft(home.path())
            .args(["config", "set", "secrets.provider", "vault"])
            .assert()
            .failure();

        assert!(!home.path().join("config.toml").exists());
    }

    #[test]
    fn global_only_keys_refuse_local() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["config", "set", "default_server", "h", "--local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("global config"));
    }

    #[test]
    fn list_shows_defaults() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["config", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_depth = 10"))
            .stdout(predicate::str::contains("root_token = (not set)"))
            .stdout(predicate::str::contains("secrets.provider = file"));
    }
}

mod auth {
    use super::*;

    #[test]
    fn token_lifecycle() {
        let home = TempDir::new().unwrap();

        graft(home.path())
            .args(["-q", "auth", "--status", "--host", "speckle.example.com"])
            .assert()
            .success()
            .stdout("not_authenticated\n");

        graft(home.path())
            .args(["auth", "--host", "speckle.example.com", "--token", TOKEN])
            .assert()
            .success()
            .stdout(predicate::str::contains(TOKEN).not());

        graft(home.path())
            .args(["-q", "auth", "--status", "--host", "https://speckle.example.com/"])
            .assert()
            .success()
            .stdout("authenticated\n");

        graft(home.path())
            .args(["auth", "--logout", "--host", "speckle.example.com"])
            .assert()
            .success();

        graft(home.path())
            .args(["-q", "auth", "--status", "--host", "speckle.example.com"])
            .assert()
            .success()
            .stdout("not_authenticated\n");
    }

    #[cfg(unix)]
    #[test]
    fn secrets_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["auth", "--token", TOKEN])
            .assert()
            .success();

        let meta = std::fs::metadata(home.path().join("secrets.toml")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn non_interactive_without_token_fails() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .arg("auth")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Token required"));
    }

    #[test]
    fn rejects_malformed_token() {
        let home = TempDir::new().unwrap();
        graft(home.path())
            .args(["auth", "--token", "short"])
            .assert()
            .failure();
        assert!(!home.path().join("secrets.toml").exists());
    }
}

mod rewrite {
    use super::*;

    fn graph() -> EncodedGraph {
        let beam = Node::new("Objects.BuiltElements.Beam")
            .with_field("name", "B1")
            .with_field("SF_GEN_Weight_t", "5");
        let text = Node::new("Objects.Other.Text").with_field("value", "note");
        let root = Node::new("Objects.Organization.Model")
            .with_field("elements", vec![Value::from(beam), Value::from(text)]);
        codec::encode(&Value::from(root)).unwrap()
    }

    /// A fake server holding one version `v1` of model `main` in project `p1`.
    async fn server(graph: &EncodedGraph) -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("activeUser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "activeUser": { "id": "u1", "name": "Ada", "email": null } }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("stream(id: $id)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "stream": { "id": "p1", "name": "Tower", "role": "stream:owner" } }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("commit(id: $commit)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "stream": { "commit": {
                    "id": "v1",
                    "referencedObject": graph.root.as_str(),
                    "message": null,
                    "branchName": "main"
                } } }
            })))
            .mount(&server)
            .await;

        let lines: Vec<String> = graph
            .objects
            .iter()
            .map(|o| format!("{}\t{}", o.id, o.json))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/objects/p1/{}", graph.root)))
            .respond_with(ResponseTemplate::new(200).set_body_string(lines.join("\n")))
            .mount(&server)
            .await;

        server
    }

    async fn run(home: &Path, args: Vec<String>) -> assert_cmd::assert::Assert {
        let home = home.to_path_buf();
        tokio::task::spawn_blocking(move || graft(&home).args(args).assert())
            .await
            .unwrap()
    }

    fn args(server: &MockServer, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            "rewrite".to_string(),
            format!("{}/projects/p1/models/main@v1", server.uri()),
            "--field".into(),
            "SF_GEN_Weight_t".into(),
            "--value".into(),
            "200".into(),
            "--token".into(),
            TOKEN.into(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dry_run_reports_without_uploading() {
        let graph = graph();
        let server = server(&graph).await;
        Mock::given(method("POST"))
            .and(path("/objects/p1"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        run(home.path(), args(&server, &["--dry-run"]))
            .await
            .success()
            .stdout(predicate::str::contains("Processed 3 objects"))
            .stdout(predicate::str::contains("Changed object ids (1):"))
            .stdout(predicate::str::contains("Dry run"))
            .stdout(predicate::str::contains(TOKEN).not());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publishes_new_version_as_json() {
        let graph = graph();
        let server = server(&graph).await;
        Mock::given(method("POST"))
            .and(path("/objects/p1"))
            .and(body_string_contains("batch-1"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("commitCreate"))
            .and(body_string_contains("Updated SF_GEN_Weight_t to '200'"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "commitCreate": "v2" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let output = run(home.path(), args(&server, &["--json"]))
            .await
            .success()
            .get_output()
            .stdout
            .clone();

        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["new_version"], "v2");
        assert_eq!(report["changed"], true);
        assert_eq!(report["nodes_processed"], 3);
        assert_ne!(report["new_object"], json!(graph.root.as_str()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_token_is_an_auth_error() {
        let graph = graph();
        let server = server(&graph).await;

        let home = TempDir::new().unwrap();
        let args = vec![
            "rewrite".to_string(),
            format!("{}/projects/p1/models/main@v1", server.uri()),
            "--field".into(),
            "w".into(),
            "--value".into(),
            "1".into(),
        ];
        run(home.path(), args)
            .await
            .failure()
            .stderr(predicate::str::contains("graft auth"));
    }
}
