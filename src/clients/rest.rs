use futures_util::TryStreamExt;
use futures_util::stream;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::clients::client::{ClientError, ListedResource};
use crate::operation::{OperationBody, OperationHandle};
use crate::resource::{Location, Project, ResourceDefinition, ResourceKind, ResourceRef};

/// An already-issued OAuth access token. Never printed.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

pub const RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

/// A page of any paginated list response.
trait Page: DeserializeOwned {
    fn into_parts(self) -> (Vec<ListedResource>, Option<String>);
}

/// One page of a Compute `list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ListedResource>,
    next_page_token: Option<String>,
}

impl Page for ListPage {
    fn into_parts(self) -> (Vec<ListedResource>, Option<String>) {
        (self.items, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    project_id: String,
    #[serde(default)]
    display_name: String,
}

/// One page of a Resource Manager `projects:search` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPage {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    next_page_token: Option<String>,
}

impl Page for ProjectPage {
    fn into_parts(self) -> (Vec<ListedResource>, Option<String>) {
        let projects = self
            .projects
            .into_iter()
            .map(|p| ListedResource {
                name: if p.display_name.is_empty() {
                    p.project_id.clone()
                } else {
                    p.display_name
                },
                id: p.project_id,
            })
            .collect();
        (projects, self.next_page_token)
    }
}

/// Google API error envelope: `{"error": {"code": .., "message": ..}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Compute Engine v1 REST backend. Project listings go to Resource Manager.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: String,
    projects_endpoint: String,
    token: AccessToken,
}

impl RestClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, token: AccessToken) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http,
            endpoint,
            projects_endpoint: RESOURCE_MANAGER_ENDPOINT.to_string(),
            token,
        }
    }

    pub fn with_projects_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.projects_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/compute/v1/{path}", self.endpoint)
    }

    fn collection_path(kind: ResourceKind, project: &Project, location: &Location) -> String {
        format!("projects/{project}/{}/{}", location.path(), kind.collection())
    }

    /// Send an authorized request and decode the JSON body. A 404 maps to
    /// `NotFound` only when the request addressed a single resource.
    async fn send(
        &self,
        request: RequestBuilder,
        addressed: Option<&ResourceRef>,
    ) -> Result<Value, ClientError> {
        let response = request.bearer_auth(self.token.secret()).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        Err(match (status, addressed) {
            (StatusCode::NOT_FOUND, Some(reference)) => ClientError::NotFound {
                kind: reference.kind,
                name: reference.name.0.clone(),
            },
            (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
                ClientError::Unauthorized(message)
            }
            _ => ClientError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn operation(
        body: Value,
        project: &Project,
        location: &Location,
    ) -> Result<OperationHandle, ClientError> {
        let body: OperationBody = serde_json::from_value(body)?;
        Ok(OperationHandle::from_body(body, project, location))
    }

    pub async fn create(
        &self,
        project: &Project,
        location: &Location,
        definition: &ResourceDefinition,
    ) -> Result<OperationHandle, ClientError> {
        let path = Self::collection_path(definition.kind, project, location);
        debug!(kind = %definition.kind, %path, "insert");
        let body = self
            .send(self.http.post(self.url(&path)).json(&definition.body), None)
            .await?;
        Self::operation(body, project, location)
    }

    pub async fn get(&self, reference: &ResourceRef) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&reference.path())), Some(reference))
            .await
    }

    pub async fn delete(&self, reference: &ResourceRef) -> Result<OperationHandle, ClientError> {
        debug!(kind = %reference.kind, name = %reference.name, "delete");
        let body = self
            .send(self.http.delete(self.url(&reference.path())), Some(reference))
            .await?;
        Self::operation(body, &reference.project, &reference.location)
    }

    /// Follow `nextPageToken` until the collection is exhausted.
    async fn list_pages<P: Page>(&self, url: &str) -> Result<Vec<ListedResource>, ClientError> {
        let pages = stream::try_unfold(Some(None::<String>), move |cursor| async move {
            let Some(page_token) = cursor else {
                return Ok(None);
            };
            let mut request = self.http.get(url);
            if let Some(page_token) = &page_token {
                request = request.query(&[("pageToken", page_token)]);
            }
            let page: P = serde_json::from_value(self.send(request, None).await?)?;
            let (items, next_page_token) = page.into_parts();
            Ok::<_, ClientError>(Some((items, next_page_token.map(Some))))
        });
        let pages: Vec<Vec<ListedResource>> = pages.try_collect().await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn list_all(&self, path: &str) -> Result<Vec<ListedResource>, ClientError> {
        self.list_pages::<ListPage>(&self.url(path)).await
    }

    pub async fn list(
        &self,
        kind: ResourceKind,
        project: &Project,
        location: &Location,
    ) -> Result<Vec<ListedResource>, ClientError> {
        self.list_all(&Self::collection_path(kind, project, location))
            .await
    }

    pub async fn list_regions(&self, project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        self.list_all(&format!("projects/{project}/regions")).await
    }

    pub async fn list_zones(&self, project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        self.list_all(&format!("projects/{project}/zones")).await
    }

    /// Projects visible to the token, as `{id: projectId, name: displayName}`.
    pub async fn list_projects(&self) -> Result<Vec<ListedResource>, ClientError> {
        let url = format!("{}/v3/projects:search", self.projects_endpoint);
        self.list_pages::<ProjectPage>(&url).await
    }

    /// `POST .../operations/{name}/wait` on the collection matching the
    /// operation's location.
    pub async fn wait_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, ClientError> {
        let path = format!(
            "projects/{}/{}/operations/{}/wait",
            handle.project,
            handle.location.path(),
            handle.name
        );
        let body = self.send(self.http.post(self.url(&path)), None).await?;
        Self::operation(body, &handle.project, &handle.location)
    }
}
