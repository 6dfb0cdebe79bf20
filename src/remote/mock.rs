//! remote::mock
//!
//! Mock remote for deterministic testing.
//!
//! # Design
//!
//! The mock keeps projects, versions and objects in memory. Uploaded graphs
//! land in the same object table downloads read from, so a rewrite followed
//! by a download of the new version sees the rewritten graph. Failures can
//! be injected per operation and every call is recorded.
//!
//! # Example
//!
//! ```
//! use graftwork::remote::mock::MockRemote;
//! use graftwork::remote::Remote;
//! use graftwork::core::types::ProjectId;
//!
//! # tokio_test::block_on(async {
//! let remote = MockRemote::new().with_project("p1", "Tower");
//!
//! let project = remote.project(&ProjectId::new("p1").unwrap()).await.unwrap();
//! assert_eq!(project.name, "Tower");
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{
    CreateVersionRequest, ProjectInfo, Remote, RemoteError, UserInfo, VersionInfo,
};
use crate::core::codec::{self, EncodedGraph, ObjectTable};
use crate::core::types::{ObjectId, ProjectId, VersionId};

/// Mock remote for testing.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug)]
struct MockRemoteInner {
    user: Option<UserInfo>,
    projects: HashMap<ProjectId, ProjectInfo>,
    versions: HashMap<(ProjectId, VersionId), VersionInfo>,
    objects: ObjectTable,
    next_version: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    ActiveUser(RemoteError),
    Project(RemoteError),
    Version(RemoteError),
    DownloadObjects(RemoteError),
    UploadObjects(RemoteError),
    CreateVersion(RemoteError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    ActiveUser,
    Project {
        project: ProjectId,
    },
    Version {
        project: ProjectId,
        version: VersionId,
    },
    DownloadObjects {
        project: ProjectId,
        root: ObjectId,
    },
    UploadObjects {
        project: ProjectId,
        root: ObjectId,
        count: usize,
    },
    CreateVersion(CreateVersionRequest),
}

impl MockRemote {
    /// Create a mock with an authenticated test user and no projects.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockRemoteInner {
                user: Some(UserInfo {
                    id: "user-1".to_string(),
                    name: "Test User".to_string(),
                    email: Some("test@example.com".to_string()),
                }),
                projects: HashMap::new(),
                versions: HashMap::new(),
                objects: ObjectTable::new(),
                next_version: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Simulate a missing or rejected token.
    pub fn without_user(self) -> Self {
        self.state().user = None;
        self
    }

    /// Add a project.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid project id.
    pub fn with_project(self, id: &str, name: &str) -> Self {
        let id = ProjectId::new(id).expect("valid project id");
        self.state().projects.insert(
            id.clone(),
            ProjectInfo {
                id,
                name: name.to_string(),
                role: Some("stream:owner".to_string()),
            },
        );
        self
    }

    /// Store a graph and register a version pointing at its root.
    ///
    /// # Panics
    ///
    /// Panics if an id is invalid or the encoded graph cannot be read back.
    pub fn with_version(self, project: &str, model: &str, version: &str, graph: &EncodedGraph) -> Self {
        let project = ProjectId::new(project).expect("valid project id");
        let version = VersionId::new(version).expect("valid version id");
        let table = codec::table_from_encoded(graph).expect("encoded graph parses");
        {
            let mut inner = self.state();
            inner.objects.extend(table);
            inner.versions.insert(
                (project, version.clone()),
                VersionInfo {
                    id: version,
                    referenced_object: graph.root.clone(),
                    message: None,
                    model: Some(model.to_string()),
                },
            );
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Every `create_version` request, failed ones included, in order.
    pub fn created_versions(&self) -> Vec<CreateVersionRequest> {
        self.state()
            .operations
            .iter()
            .filter_map(|op| match op {
                MockOperation::CreateVersion(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Raw stored object (for test verification).
    pub fn object(&self, id: &ObjectId) -> Option<serde_json::Value> {
        self.state().objects.get(id).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    fn state(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: MockOperation) {
        self.state().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Result<(), RemoteError> {
        let inner = self.state();
        match &inner.fail_on {
            Some(FailOn::ActiveUser(e)) if expected == "active_user" => Err(e.clone()),
            Some(FailOn::Project(e)) if expected == "project" => Err(e.clone()),
            Some(FailOn::Version(e)) if expected == "version" => Err(e.clone()),
            Some(FailOn::DownloadObjects(e)) if expected == "download_objects" => Err(e.clone()),
            Some(FailOn::UploadObjects(e)) if expected == "upload_objects" => Err(e.clone()),
            Some(FailOn::CreateVersion(e)) if expected == "create_version" => Err(e.clone()),
            _ => Ok(()),
        }
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Remote for MockRemote {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn active_user(&self) -> Result<UserInfo, RemoteError> {
        self.record(MockOperation::ActiveUser);
        self.check_fail("active_user")?;
        self.state().user.clone().ok_or(RemoteError::AuthRequired)
    }

    async fn project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError> {
        self.record(MockOperation::Project {
            project: project.clone(),
        });
        self.check_fail("project")?;
        self.state()
            .projects
            .get(project)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("project {}", project)))
    }

    async fn version(
        &self,
        project: &ProjectId,
        version: &VersionId,
    ) -> Result<VersionInfo, RemoteError> {
        self.record(MockOperation::Version {
            project: project.clone(),
            version: version.clone(),
        });
        self.check_fail("version")?;
        self.state()
            .versions
            .get(&(project.clone(), version.clone()))
            .cloned()
            .ok_or_else(|| {
                RemoteError::NotFound(format!("version {} in project {}", version, project))
            })
    }

    async fn download_objects(
        &self,
        project: &ProjectId,
        root: &ObjectId,
    ) -> Result<ObjectTable, RemoteError> {
        self.record(MockOperation::DownloadObjects {
            project: project.clone(),
            root: root.clone(),
        });
        self.check_fail("download_objects")?;
        let inner = self.state();
        if !inner.objects.contains_key(root) {
            return Err(RemoteError::NotFound(format!("object {}", root)));
        }
        Ok(inner.objects.clone())
    }

    async fn upload_objects(
        &self,
        project: &ProjectId,
        graph: &EncodedGraph,
    ) -> Result<ObjectId, RemoteError> {
        self.record(MockOperation::UploadObjects {
            project: project.clone(),
            root: graph.root.clone(),
            count: graph.objects.len(),
        });
        self.check_fail("upload_objects")?;
        let table =
            codec::table_from_encoded(graph).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        self.state().objects.extend(table);
        Ok(graph.root.clone())
    }

    async fn create_version(
        &self,
        request: CreateVersionRequest,
    ) -> Result<VersionId, RemoteError> {
        self.record(MockOperation::CreateVersion(request.clone()));
        self.check_fail("create_version")?;

        let mut inner = self.state();
        if !inner.projects.contains_key(&request.project) {
            return Err(RemoteError::NotFound(format!("project {}", request.project)));
        }
        if !inner.objects.contains_key(&request.object) {
            return Err(RemoteError::ApiError {
                status: 400,
                message: format!("object {} was never uploaded", request.object),
            });
        }

        let id = VersionId::new(format!("mock{:06}", inner.next_version))
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        inner.next_version += 1;
        inner.versions.insert(
            (request.project.clone(), id.clone()),
            VersionInfo {
                id: id.clone(),
                referenced_object: request.object.clone(),
                message: Some(request.message.clone()),
                model: Some(request.model.as_str().to_string()),
            },
        );
        Ok(id)
    }
}
