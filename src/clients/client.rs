use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::fake::FakeClient;
use crate::clients::rest::RestClient;
use crate::operation::OperationHandle;
use crate::resource::{Location, Project, ResourceDefinition, ResourceKind, ResourceRef};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The addressed resource does not exist, or lives in another
    /// zone/region than the one asked for.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: ResourceKind, name: String },

    /// Credentials missing, expired, or lacking permission.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The provider rejected the request: validation, quota, name conflict.
    #[error("compute API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// One row of a list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedResource {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// Capability object for the Compute resource API.
///
/// Passed explicitly into every orchestrator, builder and action call; the
/// authorization it carries is fixed when the backend is constructed.
#[derive(Debug, Clone)]
pub enum ResourceClient {
    Rest(RestClient),
    Fake(FakeClient),
}

impl ResourceClient {
    /// Insert a resource. Returns the operation acknowledging the insert,
    /// not the resource body.
    pub async fn create(
        &self,
        project: &Project,
        location: &Location,
        definition: &ResourceDefinition,
    ) -> Result<OperationHandle, ClientError> {
        match self {
            Self::Rest(c) => c.create(project, location, definition).await,
            Self::Fake(c) => c.create(project, location, definition).await,
        }
    }

    /// Fetch the full, provider-populated representation of a resource.
    pub async fn get(&self, reference: &ResourceRef) -> Result<Value, ClientError> {
        match self {
            Self::Rest(c) => c.get(reference).await,
            Self::Fake(c) => c.get(reference).await,
        }
    }

    pub async fn delete(&self, reference: &ResourceRef) -> Result<OperationHandle, ClientError> {
        match self {
            Self::Rest(c) => c.delete(reference).await,
            Self::Fake(c) => c.delete(reference).await,
        }
    }

    pub async fn list(
        &self,
        kind: ResourceKind,
        project: &Project,
        location: &Location,
    ) -> Result<Vec<ListedResource>, ClientError> {
        match self {
            Self::Rest(c) => c.list(kind, project, location).await,
            Self::Fake(c) => c.list(kind, project, location).await,
        }
    }

    pub async fn list_regions(&self, project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        match self {
            Self::Rest(c) => c.list_regions(project).await,
            Self::Fake(c) => c.list_regions(project).await,
        }
    }

    pub async fn list_zones(&self, project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        match self {
            Self::Rest(c) => c.list_zones(project).await,
            Self::Fake(c) => c.list_zones(project).await,
        }
    }

    /// Projects the credentials can see. Not scoped to any project.
    pub async fn list_projects(&self) -> Result<Vec<ListedResource>, ClientError> {
        match self {
            Self::Rest(c) => c.list_projects().await,
            Self::Fake(c) => c.list_projects().await,
        }
    }

    /// One long-poll round against the operations collection matching the
    /// handle's location.
    pub async fn wait_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, ClientError> {
        match self {
            Self::Rest(c) => c.wait_operation(handle).await,
            Self::Fake(c) => c.wait_operation(handle).await,
        }
    }
}
