use fail::fail_point;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clients::client::{ClientError, ResourceClient};
use crate::operation::{self, OperationError};
use crate::orchestrator::CreationLog;
use crate::resource::{CreatedResource, Project};

/// A created resource whose compensating delete did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedResource {
    #[serde(flatten)]
    pub resource: CreatedResource,
    pub error: String,
}

/// Outcome of one rollback, in deletion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub deleted: Vec<CreatedResource>,
    pub orphaned: Vec<OrphanedResource>,
}

impl RollbackReport {
    /// Every created resource was deleted.
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("delete rejected: {0}")]
    Delete(#[source] ClientError),
    #[error(transparent)]
    Operation(#[from] OperationError),
}

async fn delete_one(
    client: &ResourceClient,
    project: &Project,
    resource: &CreatedResource,
) -> Result<(), RollbackError> {
    fail_point!("rollback-before-delete", |_| Err(RollbackError::Delete(
        ClientError::Internal(anyhow::anyhow!("injected rollback failure"))
    )));
    let handle = client
        .delete(&resource.reference(project))
        .await
        .map_err(RollbackError::Delete)?;
    operation::wait_until_done(client, handle).await?;
    Ok(())
}

/// Delete everything in `log`, last created first.
///
/// Best-effort: a failed delete is logged and recorded as orphaned, and the
/// remaining deletes still run. Never fails.
pub async fn rollback(
    client: &ResourceClient,
    project: &Project,
    log: CreationLog,
) -> RollbackReport {
    let mut report = RollbackReport::default();
    warn!(resources = log.len(), "starting rollback");

    for resource in log.into_reversed() {
        match delete_one(client, project, &resource).await {
            Ok(()) => {
                info!(kind = %resource.kind, name = %resource.name, "rolled back");
                report.deleted.push(resource);
            }
            Err(e) => {
                error!(
                    kind = %resource.kind,
                    name = %resource.name,
                    error = %e,
                    "rollback failed, resource left orphaned"
                );
                report.orphaned.push(OrphanedResource {
                    resource,
                    error: e.to_string(),
                });
            }
        }
    }

    if report.is_clean() {
        info!(deleted = report.deleted.len(), "rollback complete");
    } else {
        warn!(
            deleted = report.deleted.len(),
            orphaned = report.orphaned.len(),
            "rollback incomplete"
        );
    }
    report
}
