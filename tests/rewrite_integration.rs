//! Integration tests for the rewrite pipeline.
//!
//! These tests run the full download, walk, encode, upload and version flow
//! against `MockRemote`.

use graftwork::core::codec::{self, EncodedGraph};
use graftwork::core::object::{node_ref, Node, Value};
use graftwork::core::types::{ObjectId, VersionId};
use graftwork::core::url::ModelUrl;
use graftwork::engine::runner::{run_rewrite, RewriteRequest, RunError};
use graftwork::remote::mock::{FailOn, MockOperation, MockRemote};
use graftwork::remote::RemoteError;
use graftwork::ui::output::Verbosity;

const URL: &str = "https://app.speckle.systems/projects/p1/models/structure@v1";

/// A model with a level shared by two beams, plus an untouched annotation.
fn model() -> EncodedGraph {
    let level = node_ref(
        Node::new("Objects.BuiltElements.Level")
            .with_field("name", "L1")
            .with_field("SF_GEN_Weight_t", "0"),
    );
    let beam = |name: &str| {
        Value::from(
            Node::new("Objects.BuiltElements.Beam")
                .with_field("name", name)
                .with_field("SF_GEN_Weight_t", "5")
                .with_field("level", Value::from(level.clone())),
        )
    };
    let annotation = Value::from(Node::new("Objects.Other.Text").with_field("value", "note"));

    let root = Node::new("Objects.Organization.Model").with_field(
        "elements",
        vec![beam("B1"), beam("B2"), annotation, Value::from("loose scalar")],
    );
    codec::encode(&Value::from(root)).unwrap()
}

fn setup() -> (MockRemote, EncodedGraph) {
    let graph = model();
    let remote = MockRemote::new()
        .with_project("p1", "Tower")
        .with_version("p1", "structure", "v1", &graph);
    (remote, graph)
}

fn request() -> RewriteRequest {
    RewriteRequest::new(
        ModelUrl::parse(URL).unwrap(),
        "SF_GEN_Weight_t",
        serde_json::json!("200"),
    )
}

/// Collect the field across the stored graph of `root`, using its closure.
fn field_values(remote: &MockRemote, root: &ObjectId) -> Vec<serde_json::Value> {
    let stored = remote.object(root).unwrap();
    let mut ids = vec![root.clone()];
    if let Some(closure) = stored["__closure"].as_object() {
        ids.extend(closure.keys().map(|id| ObjectId::new(id.as_str()).unwrap()));
    }
    ids.iter()
        .filter_map(|id| remote.object(id))
        .filter_map(|object| object.get("SF_GEN_Weight_t").cloned())
        .collect()
}

#[tokio::test]
async fn shared_level_is_rewritten_once() {
    let (remote, graph) = setup();

    let report = run_rewrite(&remote, &request(), Verbosity::Quiet)
        .await
        .unwrap();

    assert!(report.changed);
    // B1, B2 and the shared level
    assert_eq!(report.ledger.mutation_count(), 3);
    // root, B1, B2, level, annotation
    assert_eq!(report.nodes_processed, 5);
    assert!(report.failures.is_empty());

    let new_root = report.new_object.clone().unwrap();
    assert_ne!(new_root, graph.root);
    let values = field_values(&remote, &new_root);
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| *v == serde_json::json!("200")));
}

#[tokio::test]
async fn root_token_hides_the_container_from_visited() {
    let (remote, graph) = setup();
    let mut req = request();
    req.root_token = Some(graph.root.to_string());

    let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

    let visited: Vec<_> = report.ledger.visited_ids().iter().flatten().collect();
    assert_eq!(visited.len(), 4);
    assert!(!visited.contains(&&graph.root));
}

#[tokio::test]
async fn depth_zero_only_touches_the_root() {
    let (remote, _) = setup();
    let mut req = request();
    req.max_depth = 0;

    let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

    assert_eq!(report.nodes_processed, 1);
    assert!(!report.changed);
    assert!(report.new_version.is_some());
}

#[tokio::test]
async fn new_version_chains_onto_the_source() {
    let (remote, _) = setup();
    let mut req = request();
    req.message = Some("weights for review".into());

    let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

    let created = remote.created_versions();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].message, "weights for review");
    assert_eq!(created[0].model.as_str(), "structure");
    assert_eq!(created[0].parent, Some(VersionId::new("v1").unwrap()));
    assert_eq!(created[0].source_application, "graft");
    assert_eq!(Some(&created[0].object), report.new_object.as_ref());

    let url = report.new_version_url(&req.url).unwrap();
    assert_eq!(url.version(), report.new_version.as_ref().unwrap());
}

#[tokio::test]
async fn rewriting_the_new_version_again_is_stable() {
    let (remote, _) = setup();
    let first = run_rewrite(&remote, &request(), Verbosity::Quiet)
        .await
        .unwrap();

    let next_url = first.new_version_url(&request().url).unwrap();
    let second_request = RewriteRequest::new(next_url, "SF_GEN_Weight_t", serde_json::json!("200"));
    let second = run_rewrite(&remote, &second_request, Verbosity::Quiet)
        .await
        .unwrap();

    assert_eq!(second.ledger.mutation_count(), 3);
    assert_eq!(second.new_object, first.new_object);
}

#[tokio::test]
async fn missing_version_is_reported() {
    let (remote, _) = setup();
    let req = RewriteRequest::new(
        ModelUrl::parse("https://app.speckle.systems/projects/p1/models/structure@nope").unwrap(),
        "SF_GEN_Weight_t",
        serde_json::json!("200"),
    );

    let err = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap_err();

    assert!(matches!(err, RunError::Remote(RemoteError::NotFound(_))));
}

#[tokio::test]
async fn unknown_project_fails_access_check() {
    let (remote, _) = setup();
    let req = RewriteRequest::new(
        ModelUrl::parse("https://app.speckle.systems/projects/other/models/structure@v1").unwrap(),
        "SF_GEN_Weight_t",
        serde_json::json!("200"),
    );

    let err = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap_err();

    assert!(matches!(err, RunError::Access(RemoteError::NotFound(_))));
    assert!(!remote
        .operations()
        .iter()
        .any(|op| matches!(op, MockOperation::DownloadObjects { .. })));
}

#[tokio::test]
async fn upload_failure_creates_no_version() {
    let (remote, _) = setup();
    let remote = remote.fail_on(FailOn::UploadObjects(RemoteError::ApiError {
        status: 500,
        message: "server error: boom".into(),
    }));

    let err = run_rewrite(&remote, &request(), Verbosity::Quiet)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Remote(RemoteError::ApiError { status: 500, .. })));
    assert!(remote.created_versions().is_empty());
}

#[tokio::test]
async fn number_values_are_written_as_numbers() {
    let (remote, _) = setup();
    let mut req = request();
    req.value = serde_json::json!(12.5);

    let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

    let new_root = report.new_object.unwrap();
    let values = field_values(&remote, &new_root);
    assert!(values.iter().all(|v| *v == serde_json::json!(12.5)));
    assert!(remote.created_versions()[0].message.contains("12.5"));
}
