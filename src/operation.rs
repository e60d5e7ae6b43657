use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::client::{ClientError, ResourceClient};
use crate::resource::{Location, Project};

/// Lifecycle of a Compute long-running operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[default]
    Pending,
    Running,
    Done,
}

/// The `error` block a finished operation carries when it did not take effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl OperationErrors {
    pub fn single(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![OperationErrorDetail {
                code: code.into(),
                message: message.into(),
            }],
        }
    }

    fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Wire shape of an Operation resource, as returned by insert/delete/wait.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OperationBody {
    pub name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub error: Option<OperationErrors>,
}

/// Handle to an in-flight operation. Owned by the waiter for the duration of
/// one wait; the location picks which operations collection is polled.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationHandle {
    pub name: String,
    pub project: Project,
    pub location: Location,
    pub status: OperationStatus,
    pub error: Option<OperationErrors>,
}

impl OperationHandle {
    pub(crate) fn from_body(body: OperationBody, project: &Project, location: &Location) -> Self {
        Self {
            name: body.name,
            project: project.clone(),
            location: location.clone(),
            status: body.status,
            error: body.error,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }

    /// Provider errors reported on a finished operation, if any.
    pub fn failure(&self) -> Option<&OperationErrors> {
        self.error.as_ref().filter(|e| !e.errors.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The wait call itself failed (network, auth, provider outage).
    #[error("polling operation {operation} failed: {source}")]
    Poll {
        operation: String,
        #[source]
        source: ClientError,
    },

    /// The operation reached DONE but reports that its work failed.
    #[error("operation {operation} failed: {message}")]
    Failed { operation: String, message: String },
}

/// Block until `handle` reaches `DONE`.
///
/// Each round is a provider long-poll, which returns when the status changes
/// or after the provider's own timeout; there is no local backoff and no
/// iteration cap.
pub async fn wait_until_done(
    client: &ResourceClient,
    handle: OperationHandle,
) -> Result<OperationHandle, OperationError> {
    let mut operation = handle;
    let mut polls = 0u32;
    while !operation.is_done() {
        polls += 1;
        debug!(
            operation = %operation.name,
            status = ?operation.status,
            polls,
            "waiting for operation"
        );
        operation = client
            .wait_operation(&operation)
            .await
            .map_err(|source| OperationError::Poll {
                operation: operation.name.clone(),
                source,
            })?;
    }

    if let Some(errors) = operation.failure() {
        return Err(OperationError::Failed {
            operation: operation.name.clone(),
            message: errors.summary(),
        });
    }
    debug!(operation = %operation.name, polls, "operation done");
    Ok(operation)
}
