//! remote::speckle
//!
//! Remote implementation for Speckle-compatible servers.
//!
//! # Design
//!
//! This module implements the `Remote` trait using:
//! - GraphQL (`/graphql`) for the user, project and version queries and for
//!   creating versions
//! - REST for object transfer: `GET /objects/<project>/<id>` streams the
//!   graph as `id<TAB>json` lines, `POST /objects/<project>` takes a
//!   multipart batch
//!
//! # Authentication
//!
//! Every request carries `Authorization: Bearer <token>`. The token is never
//! logged or included in `Debug` output.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::remote::speckle::SpeckleRemote;
//! use graftwork::remote::Remote;
//!
//! let remote = SpeckleRemote::new("app.speckle.systems", token);
//! let user = remote.active_user().await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::traits::{
    CreateVersionRequest, ProjectInfo, Remote, RemoteError, UserInfo, VersionInfo,
};
use crate::core::codec::{self, EncodedGraph, ObjectTable};
use crate::core::types::{ObjectId, ProjectId, VersionId};
use crate::core::url::sanitize_server_url;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "graft-cli";

/// Multipart field name for an upload batch.
const BATCH_FIELD: &str = "batch-1";

const ACTIVE_USER_QUERY: &str = r#"query {
    activeUser { id name email }
}"#;

const PROJECT_QUERY: &str = r#"query($id: String!) {
    stream(id: $id) { id name role }
}"#;

const VERSION_QUERY: &str = r#"query($stream: String!, $commit: String!) {
    stream(id: $stream) {
        commit(id: $commit) { id referencedObject message branchName }
    }
}"#;

const CREATE_VERSION_MUTATION: &str = r#"mutation($commit: CommitCreateInput!) {
    commitCreate(commit: $commit)
}"#;

/// Speckle server remote.
pub struct SpeckleRemote {
    client: Client,
    token: Option<String>,
    /// Base URL with scheme, without trailing slash
    base_url: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for SpeckleRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeckleRemote")
            .field("has_token", &self.token.is_some())
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SpeckleRemote {
    /// Create a remote for `server` over HTTPS.
    ///
    /// `server` may be given with or without scheme; it is sanitized first.
    pub fn new(server: &str, token: impl Into<String>) -> Self {
        let base_url = format!("https://{}", sanitize_server_url(server));
        Self::with_base_url(base_url, Some(token.into()))
    }

    /// Create a remote against an explicit base URL (scheme included).
    ///
    /// Used for plain-HTTP servers and for tests against a local mock server.
    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            token: token.filter(|t| !t.is_empty()),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap, RemoteError> {
        let token = self.token.as_deref().ok_or(RemoteError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| RemoteError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Run a GraphQL operation and return its `data` payload.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, RemoteError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(self.url("graphql"))
            .headers(self.headers()?)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Self::handle_error_response(response, status).await;
        }

        let result: GraphQLResponse<T> = response.json().await.map_err(|e| {
            RemoteError::Malformed(format!("failed to parse GraphQL response: {}", e))
        })?;

        if let Some(error) = result.errors.and_then(|errors| errors.into_iter().next()) {
            return Err(error.into_remote_error());
        }

        result
            .data
            .ok_or_else(|| RemoteError::Malformed("GraphQL response without data".into()))
    }

    /// Map an error response to a `RemoteError`.
    async fn handle_error_response<T>(
        response: Response,
        status: StatusCode,
    ) -> Result<T, RemoteError> {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.trim().to_string()
                }
            });

        Err(match status {
            StatusCode::UNAUTHORIZED => RemoteError::AuthFailed(message),
            StatusCode::FORBIDDEN => RemoteError::PermissionDenied(message),
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited,
            _ if status.is_server_error() => RemoteError::ApiError {
                status: status.as_u16(),
                message: format!("server error: {}", message),
            },
            _ => RemoteError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl Remote for SpeckleRemote {
    fn name(&self) -> &'static str {
        "speckle"
    }

    async fn active_user(&self) -> Result<UserInfo, RemoteError> {
        let data: ActiveUserData = self
            .graphql(ACTIVE_USER_QUERY, serde_json::json!({}))
            .await?;
        let user = data.active_user.ok_or_else(|| {
            RemoteError::AuthFailed("the server did not recognize the token".into())
        })?;
        Ok(UserInfo {
            id: user.id,
            name: user.name.unwrap_or_else(|| "Unknown".to_string()),
            email: user.email,
        })
    }

    async fn project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError> {
        let data: StreamData<SpeckleStream> = self
            .graphql(PROJECT_QUERY, serde_json::json!({ "id": project.as_str() }))
            .await?;
        let stream = data
            .stream
            .ok_or_else(|| RemoteError::NotFound(format!("project {}", project)))?;
        Ok(ProjectInfo {
            id: ProjectId::new(stream.id).map_err(|e| RemoteError::Malformed(e.to_string()))?,
            name: stream.name,
            role: stream.role,
        })
    }

    async fn version(
        &self,
        project: &ProjectId,
        version: &VersionId,
    ) -> Result<VersionInfo, RemoteError> {
        let data: StreamData<SpeckleStreamCommit> = self
            .graphql(
                VERSION_QUERY,
                serde_json::json!({ "stream": project.as_str(), "commit": version.as_str() }),
            )
            .await?;
        let not_found = || RemoteError::NotFound(format!("version {} in project {}", version, project));
        let commit = data.stream.and_then(|s| s.commit).ok_or_else(not_found)?;

        Ok(VersionInfo {
            id: VersionId::new(commit.id).map_err(|e| RemoteError::Malformed(e.to_string()))?,
            referenced_object: ObjectId::new(commit.referenced_object)
                .map_err(|e| RemoteError::Malformed(e.to_string()))?,
            message: commit.message,
            model: commit.branch_name,
        })
    }

    async fn download_objects(
        &self,
        project: &ProjectId,
        root: &ObjectId,
    ) -> Result<ObjectTable, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("objects/{}/{}", project, root)))
            .headers(self.headers()?)
            .header(ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Self::handle_error_response(response, status).await;
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        let table =
            codec::parse_object_lines(&body).map_err(|e| RemoteError::Malformed(e.to_string()))?;

        if !table.contains_key(root) {
            return Err(RemoteError::NotFound(format!("object {}", root)));
        }
        Ok(table)
    }

    async fn upload_objects(
        &self,
        project: &ProjectId,
        graph: &EncodedGraph,
    ) -> Result<ObjectId, RemoteError> {
        let part = Part::text(graph.batch_json())
            .file_name(BATCH_FIELD)
            .mime_str("application/json")
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        let form = Form::new().part(BATCH_FIELD, part);

        let response = self
            .client
            .post(self.url(&format!("objects/{}", project)))
            .headers(self.headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Self::handle_error_response(response, status).await;
        }
        Ok(graph.root.clone())
    }

    async fn create_version(
        &self,
        request: CreateVersionRequest,
    ) -> Result<VersionId, RemoteError> {
        let mut commit = serde_json::json!({
            "streamId": request.project.as_str(),
            "branchName": request.model.as_str(),
            "objectId": request.object.as_str(),
            "message": request.message,
            "sourceApplication": request.source_application,
            "totalChildrenCount": request.total_children,
        });
        if let Some(parent) = &request.parent {
            commit["parents"] = serde_json::json!([parent.as_str()]);
        }

        let data: CommitCreateData = self
            .graphql(CREATE_VERSION_MUTATION, serde_json::json!({ "commit": commit }))
            .await?;
        VersionId::new(data.commit_create).map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
    extensions: Option<GraphQLErrorExtensions>,
}

#[derive(Deserialize)]
struct GraphQLErrorExtensions {
    code: Option<String>,
}

impl GraphQLError {
    fn into_remote_error(self) -> RemoteError {
        let code = self.extensions.and_then(|e| e.code).unwrap_or_default();
        match code.as_str() {
            "UNAUTHENTICATED" => RemoteError::AuthFailed(self.message),
            "FORBIDDEN" => RemoteError::PermissionDenied(self.message),
            "NOT_FOUND" | "STREAM_NOT_FOUND" | "COMMIT_NOT_FOUND" => {
                RemoteError::NotFound(self.message)
            }
            _ => RemoteError::ApiError {
                status: 200,
                message: self.message,
            },
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        self.message.or(self.error)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveUserData {
    active_user: Option<SpeckleUser>,
}

#[derive(Deserialize)]
struct SpeckleUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct StreamData<S> {
    stream: Option<S>,
}

#[derive(Deserialize)]
struct SpeckleStream {
    id: String,
    name: String,
    role: Option<String>,
}

#[derive(Deserialize)]
struct SpeckleStreamCommit {
    commit: Option<SpeckleCommit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeckleCommit {
    id: String,
    referenced_object: String,
    message: Option<String>,
    branch_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitCreateData {
    commit_create: String,
}
