//! engine::runner
//!
//! The rewrite pipeline: one model version in, one new version out.
//!
//! # Pipeline
//!
//! ```text
//! verify access -> resolve version -> download -> materialize -> walk
//!     -> [re-check project -> encode -> upload -> create version]
//! ```
//!
//! The bracketed steps are skipped in dry-run mode, and when nothing
//! matched and `skip_unchanged` is set. Otherwise a new version is created
//! even when no field matched.
//!
//! The in-memory graph never crosses an await point: materializing,
//! walking and encoding happen in one synchronous step between the
//! download and the upload.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::engine::runner::{run_rewrite, RewriteRequest};
//!
//! let request = RewriteRequest::new(url, "SF_GEN_Weight_t", serde_json::json!("200"));
//! let report = run_rewrite(&remote, &request, verbosity).await?;
//! println!("changed: {}", report.changed);
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::ledger::ChangeLedger;
use super::policy::{MutationPolicy, PolicyError};
use super::walk::{walk, MemberFailure, WalkOptions, DEFAULT_MAX_DEPTH, MAX_DEPTH_LIMIT};
use crate::core::codec::{self, CodecError, EncodedGraph, ObjectTable};
use crate::core::config::DEFAULT_SOURCE_APPLICATION;
use crate::core::object::Value;
use crate::core::types::{ObjectId, VersionId};
use crate::core::url::ModelUrl;
use crate::remote::{CreateVersionRequest, Remote, RemoteError};
use crate::ui::output::{self, Verbosity};

/// Errors from the rewrite pipeline.
#[derive(Debug, Error)]
pub enum RunError {
    /// Token or project access check failed.
    #[error("access check failed: {0}")]
    Access(RemoteError),

    /// Any later remote operation failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The downloaded graph could not be built, or the result encoded.
    #[error("object graph error: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("max depth {0} exceeds the limit of {}", MAX_DEPTH_LIMIT)]
    DepthTooLarge(usize),
}

impl RunError {
    /// A hint for the user, when one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RunError::Access(e) | RunError::Remote(e) => e.hint(),
            _ => None,
        }
    }
}

/// What to rewrite and where.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    /// Source version
    pub url: ModelUrl,
    /// Target field name
    pub field: String,
    /// Replacement value
    pub value: serde_json::Value,
    /// Id token; nodes whose id equals it are left out of `visited_ids`
    pub root_token: Option<String>,
    pub max_depth: usize,
    /// Message for the new version; a default is derived when unset
    pub message: Option<String>,
    pub source_application: String,
    /// Walk and report, but upload nothing
    pub dry_run: bool,
    /// Create no version when nothing matched
    pub skip_unchanged: bool,
}

impl RewriteRequest {
    pub fn new(url: ModelUrl, field: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            url,
            field: field.into(),
            value,
            root_token: None,
            max_depth: DEFAULT_MAX_DEPTH,
            message: None,
            source_application: DEFAULT_SOURCE_APPLICATION.to_string(),
            dry_run: false,
            skip_unchanged: false,
        }
    }

    /// The message for the new version.
    ///
    /// ```
    /// use graftwork::core::url::ModelUrl;
    /// use graftwork::engine::runner::RewriteRequest;
    ///
    /// let url = ModelUrl::parse("https://h/projects/p/models/m@v").unwrap();
    /// let request = RewriteRequest::new(url, "weight", serde_json::json!("200"));
    /// assert_eq!(request.version_message(), "Updated weight to '200'");
    /// ```
    pub fn version_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        let shown = match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("Updated {} to '{}'", self.field, shown)
    }

    fn policy(&self) -> Result<MutationPolicy, PolicyError> {
        let policy = MutationPolicy::new(self.field.clone(), Value::from(self.value.clone()))?;
        Ok(match &self.root_token {
            Some(token) => policy.with_root_token(token.clone()),
            None => policy,
        })
    }
}

/// Why no version was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DryRun,
    Unchanged,
}

/// Result of one rewrite run.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteReport {
    pub source_version: VersionId,
    /// Root object of the source version
    pub source_object: ObjectId,
    /// Whether any node's field was rewritten
    pub changed: bool,
    pub ledger: ChangeLedger,
    pub failures: Vec<MemberFailure>,
    pub nodes_processed: usize,
    /// Root object of the uploaded graph
    pub new_object: Option<ObjectId>,
    pub new_version: Option<VersionId>,
    pub skipped: Option<SkipReason>,
    pub finished_at: DateTime<Utc>,
}

impl RewriteReport {
    /// URL of the new version, if one was created.
    pub fn new_version_url(&self, source: &ModelUrl) -> Option<ModelUrl> {
        self.new_version.clone().map(|v| source.at_version(v))
    }
}

/// A walked graph, ready for upload.
#[derive(Debug)]
pub struct GraphRewrite {
    pub changed: bool,
    pub ledger: ChangeLedger,
    pub failures: Vec<MemberFailure>,
    pub nodes_processed: usize,
    /// Encoded result; `None` when encoding was not requested
    pub encoded: Option<EncodedGraph>,
}

/// Materialize, walk and optionally re-encode a downloaded graph.
///
/// # Errors
///
/// Returns `CodecError` if the table does not describe a complete acyclic
/// graph rooted at `root`, or if the result cannot be encoded.
pub fn rewrite_objects(
    root: &ObjectId,
    objects: &ObjectTable,
    policy: &MutationPolicy,
    options: &WalkOptions,
    encode: bool,
) -> Result<GraphRewrite, CodecError> {
    let graph = Value::Node(codec::materialize(root, objects)?);
    let outcome = walk(&graph, policy, options);
    let encoded = if encode {
        Some(codec::encode(&graph)?)
    } else {
        None
    };

    Ok(GraphRewrite {
        changed: outcome.changed,
        ledger: outcome.ledger,
        failures: outcome.failures,
        nodes_processed: outcome.nodes_processed,
        encoded,
    })
}

/// Run the full pipeline against `remote`.
///
/// # Errors
///
/// - `RunError::Access` if the token or project check fails
/// - `RunError::Remote` for any later server failure
/// - `RunError::Codec` if the downloaded graph is incomplete or cyclic
/// - `RunError::Policy` if the field name is empty
pub async fn run_rewrite(
    remote: &dyn Remote,
    request: &RewriteRequest,
    verbosity: Verbosity,
) -> Result<RewriteReport, RunError> {
    if request.max_depth > MAX_DEPTH_LIMIT {
        return Err(RunError::DepthTooLarge(request.max_depth));
    }
    let policy = request.policy()?;
    let url = &request.url;
    let project_id = url.project();

    let user = remote.active_user().await.map_err(RunError::Access)?;
    output::debug(format!("authenticated as {}", user.name), verbosity);
    let project = remote.project(project_id).await.map_err(RunError::Access)?;
    output::debug(format!("project access verified: {}", project.name), verbosity);

    let version = remote.version(project_id, url.version()).await?;
    output::debug(
        format!("version {} references {}", version.id, version.referenced_object),
        verbosity,
    );

    let objects = remote
        .download_objects(project_id, &version.referenced_object)
        .await?;
    output::debug(format!("downloaded {} objects", objects.len()), verbosity);

    let options = WalkOptions::default()
        .with_max_depth(request.max_depth)
        .with_verbosity(verbosity);
    let rewritten = rewrite_objects(
        &version.referenced_object,
        &objects,
        &policy,
        &options,
        !request.dry_run,
    )?;

    let skipped = if request.dry_run {
        Some(SkipReason::DryRun)
    } else if request.skip_unchanged && !rewritten.changed {
        Some(SkipReason::Unchanged)
    } else {
        None
    };

    let mut report = RewriteReport {
        source_version: version.id.clone(),
        source_object: version.referenced_object.clone(),
        changed: rewritten.changed,
        ledger: rewritten.ledger,
        failures: rewritten.failures,
        nodes_processed: rewritten.nodes_processed,
        new_object: None,
        new_version: None,
        skipped,
        finished_at: Utc::now(),
    };

    let encoded = match (skipped, rewritten.encoded) {
        (None, Some(encoded)) => encoded,
        _ => return Ok(report),
    };

    // The project may have changed hands while the graph was processed.
    remote.project(project_id).await.map_err(RunError::Access)?;

    let new_object = remote.upload_objects(project_id, &encoded).await?;
    output::debug(
        format!("uploaded {} objects, root {}", encoded.objects.len(), new_object),
        verbosity,
    );

    let new_version = remote
        .create_version(CreateVersionRequest {
            project: project_id.clone(),
            model: url.model().clone(),
            object: new_object.clone(),
            message: request.version_message(),
            source_application: request.source_application.clone(),
            total_children: encoded.total_children(),
            parent: Some(version.id.clone()),
        })
        .await?;

    report.new_object = Some(new_object);
    report.new_version = Some(new_version);
    report.finished_at = Utc::now();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::{node_ref, Node};
    use crate::remote::mock::{FailOn, MockOperation, MockRemote};

    const URL: &str = "https://h/projects/p1/models/main@v1";

    fn sample() -> EncodedGraph {
        let beam = node_ref(Node::new("Objects.BuiltElements.Beam").with_field("weight", "5"));
        let column = node_ref(Node::new("Objects.BuiltElements.Column").with_field("name", "C1"));
        let root = Node::new("Objects.Organization.Model")
            .with_field("elements", vec![Value::from(beam), Value::from(column)]);
        codec::encode(&Value::from(node_ref(root))).unwrap()
    }

    fn remote_with_sample() -> (MockRemote, EncodedGraph) {
        let graph = sample();
        let remote = MockRemote::new()
            .with_project("p1", "Tower")
            .with_version("p1", "main", "v1", &graph);
        (remote, graph)
    }

    fn request(field: &str) -> RewriteRequest {
        RewriteRequest::new(ModelUrl::parse(URL).unwrap(), field, serde_json::json!("200"))
    }

    #[tokio::test]
    async fn rewrites_and_creates_version() {
        let (remote, graph) = remote_with_sample();

        let report = run_rewrite(&remote, &request("weight"), Verbosity::Quiet)
            .await
            .unwrap();

        assert!(report.changed);
        assert_eq!(report.ledger.mutation_count(), 1);
        assert_eq!(report.source_object, graph.root);
        let new_object = report.new_object.clone().unwrap();
        assert_ne!(new_object, graph.root);
        assert!(report.new_version.is_some());

        let created = remote.created_versions();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message, "Updated weight to '200'");
        assert_eq!(created[0].parent, Some(VersionId::new("v1").unwrap()));
        assert_eq!(created[0].total_children, 2);
    }

    #[tokio::test]
    async fn dry_run_uploads_nothing() {
        let (remote, _) = remote_with_sample();
        let mut req = request("weight");
        req.dry_run = true;

        let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

        assert!(report.changed);
        assert_eq!(report.skipped, Some(SkipReason::DryRun));
        assert!(report.new_version.is_none());
        assert!(!remote
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::UploadObjects { .. })));
    }

    #[tokio::test]
    async fn unchanged_still_versions_by_default() {
        let (remote, _) = remote_with_sample();

        let report = run_rewrite(&remote, &request("absent"), Verbosity::Quiet)
            .await
            .unwrap();

        assert!(!report.changed);
        assert!(report.new_version.is_some());
    }

    #[tokio::test]
    async fn skip_unchanged_suppresses_version() {
        let (remote, _) = remote_with_sample();
        let mut req = request("absent");
        req.skip_unchanged = true;

        let report = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap();

        assert_eq!(report.skipped, Some(SkipReason::Unchanged));
        assert!(remote.created_versions().is_empty());
    }

    #[tokio::test]
    async fn access_failure_stops_before_download() {
        let (remote, _) = remote_with_sample();
        let remote = remote.fail_on(FailOn::ActiveUser(RemoteError::AuthFailed("bad".into())));

        let err = run_rewrite(&remote, &request("weight"), Verbosity::Quiet)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Access(RemoteError::AuthFailed(_))));
        assert!(err.hint().is_some());
        assert_eq!(remote.operations(), vec![MockOperation::ActiveUser]);
    }

    #[tokio::test]
    async fn missing_version_is_remote_error() {
        let remote = MockRemote::new().with_project("p1", "Tower");
        let err = run_rewrite(&remote, &request("weight"), Verbosity::Quiet)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Remote(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn depth_over_limit_rejected_up_front() {
        let (remote, _) = remote_with_sample();
        let mut req = request("weight");
        req.max_depth = MAX_DEPTH_LIMIT + 1;

        let err = run_rewrite(&remote, &req, Verbosity::Quiet).await.unwrap_err();
        assert!(matches!(err, RunError::DepthTooLarge(_)));
        assert!(remote.operations().is_empty());
    }

    #[test]
    fn default_message_shows_non_string_json() {
        let mut req = request("weight");
        req.value = serde_json::json!(12.5);
        assert_eq!(req.version_message(), "Updated weight to '12.5'");

        req.message = Some("custom".into());
        assert_eq!(req.version_message(), "custom");
    }

    #[test]
    fn rewrite_objects_without_encoding() {
        let graph = sample();
        let table = codec::table_from_encoded(&graph).unwrap();
        let policy = MutationPolicy::new("weight", Value::from("200")).unwrap();

        let result =
            rewrite_objects(&graph.root, &table, &policy, &WalkOptions::default(), false).unwrap();

        assert!(result.changed);
        assert!(result.encoded.is_none());
        assert_eq!(result.nodes_processed, 3);
    }

    #[tokio::test]
    async fn root_token_matches_ids_not_type_tags() {
        let (remote, graph) = remote_with_sample();

        let mut by_type = request("weight");
        by_type.root_token = Some("Objects.Organization.Model".into());
        let report = run_rewrite(&remote, &by_type, Verbosity::Quiet).await.unwrap();
        assert_eq!(report.ledger.visited_ids().len(), 3);

        let mut by_id = request("weight");
        by_id.root_token = Some(graph.root.to_string());
        let report = run_rewrite(&remote, &by_id, Verbosity::Quiet).await.unwrap();
        assert_eq!(report.ledger.visited_ids().len(), 2);
        assert!(!report.ledger.visited_ids().contains(&Some(graph.root.clone())));
    }
}
