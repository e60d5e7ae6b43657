use std::collections::BTreeMap;

use fail::fail_point;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::clients::client::{ClientError, ResourceClient};
use crate::definition::{BuildError, DefinitionBuilder};
use crate::operation::{self, OperationError};
use crate::params::LoadBalancerParams;
use crate::resource::{CreatedResource, Location, Project, Region, ResourceKind, Scope, Zone};
use crate::rollback::{self, RollbackReport};

/// Read-only inputs shared by every step of one run.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub project: Project,
    pub zone: Zone,
    pub region: Option<Region>,
    pub params: LoadBalancerParams,
}

impl ProvisioningContext {
    /// Where resources of `kind` live for this run. `None` for a regional
    /// kind when no region was given.
    pub fn location_for(&self, kind: ResourceKind) -> Option<Location> {
        match kind.scope() {
            Scope::Global => Some(Location::Global),
            Scope::Regional => self.region.clone().map(Location::Region),
            Scope::Zonal => Some(Location::Zone(self.zone.clone())),
        }
    }
}

/// One entry of a flavor's ordered pipeline. A step may only depend on
/// resources created by the steps before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningStep {
    pub builder: DefinitionBuilder,
}

impl ProvisioningStep {
    pub const fn new(builder: DefinitionBuilder) -> Self {
        Self { builder }
    }

    pub fn kind(&self) -> ResourceKind {
        self.builder.kind()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("create rejected: {0}")]
    Create(#[source] ClientError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    /// A step failed to build, create or complete. Carries what rollback did
    /// with the resources created before it, if any existed.
    #[error("step {step} ({kind}) failed: {source}")]
    StepFailed {
        step: usize,
        kind: ResourceKind,
        #[source]
        source: StepError,
        rollback: Option<RollbackReport>,
    },

    /// Every resource was created but could not be read back. Nothing is
    /// rolled back.
    #[error("fetching created {kind} {name:?} failed: {source}")]
    Refetch {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ClientError,
    },
}

impl ProvisioningError {
    pub fn failed_kind(&self) -> ResourceKind {
        match self {
            Self::StepFailed { kind, .. } | Self::Refetch { kind, .. } => *kind,
        }
    }

    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            Self::StepFailed { rollback, .. } => rollback.as_ref(),
            Self::Refetch { .. } => None,
        }
    }
}

/// Resources whose create operation reached `DONE`, in creation order.
///
/// Append-only while a run is in flight; consumed by value either by the
/// final refetch or by rollback.
#[derive(Debug, Default)]
pub struct CreationLog(Vec<CreatedResource>);

impl CreationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, resource: CreatedResource) {
        self.0.push(resource);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last created first.
    pub fn into_reversed(self) -> impl Iterator<Item = CreatedResource> {
        self.0.into_iter().rev()
    }

    pub fn into_entries(self) -> Vec<CreatedResource> {
        self.0
    }
}

impl FromIterator<CreatedResource> for CreationLog {
    fn from_iter<I: IntoIterator<Item = CreatedResource>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fetched resources keyed by the `kind` the provider reports on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProvisioningResult(pub BTreeMap<String, Value>);

impl ProvisioningResult {
    pub fn get(&self, provider_kind: &str) -> Option<&Value> {
        self.0.get(provider_kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

async fn run_step(
    client: &ResourceClient,
    step: &ProvisioningStep,
    ctx: &ProvisioningContext,
) -> Result<CreatedResource, StepError> {
    let kind = step.kind();
    let definition = step.builder.build(client, ctx).await?;
    let name = definition.name().ok_or(BuildError::Unnamed(kind))?;
    let location = ctx
        .location_for(kind)
        .ok_or(BuildError::MissingRegion(kind))?;

    let handle = client
        .create(&ctx.project, &location, &definition)
        .await
        .map_err(StepError::Create)?;
    fail_point!("provision-after-create", |_| Err(StepError::Operation(
        OperationError::Poll {
            operation: handle.name.clone(),
            source: ClientError::Internal(anyhow::anyhow!("injected failure after create")),
        }
    )));
    operation::wait_until_done(client, handle).await?;

    Ok(CreatedResource {
        kind,
        name,
        location,
    })
}

/// Fetch every created resource so the result carries provider-assigned
/// fields (selfLink, id, creationTimestamp, kind).
async fn refetch(
    client: &ResourceClient,
    project: &Project,
    log: CreationLog,
) -> Result<ProvisioningResult, ProvisioningError> {
    let mut result = ProvisioningResult::default();
    for created in log.into_entries() {
        let resource = client
            .get(&created.reference(project))
            .await
            .map_err(|source| ProvisioningError::Refetch {
                kind: created.kind,
                name: created.name.0.clone(),
                source,
            })?;
        let key = resource
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or(created.kind.provider_kind())
            .to_string();
        result.0.insert(key, resource);
    }
    Ok(result)
}

/// Create every step's resource in order, waiting for each operation to
/// finish before the next step builds.
///
/// When a step fails after earlier steps succeeded, those resources are
/// deleted in reverse order before the step's error is returned.
pub async fn run(
    client: &ResourceClient,
    steps: &[ProvisioningStep],
    ctx: &ProvisioningContext,
) -> Result<ProvisioningResult, ProvisioningError> {
    let mut log = CreationLog::new();

    for (index, step) in steps.iter().enumerate() {
        let step_number = index + 1;
        let kind = step.kind();
        match run_step(client, step, ctx).await {
            Ok(created) => {
                info!(step = step_number, %kind, name = %created.name, "resource created");
                log.record(created);
            }
            Err(source) => {
                error!(step = step_number, %kind, error = %source, "provisioning step failed");
                let rollback = if log.is_empty() {
                    None
                } else {
                    Some(rollback::rollback(client, &ctx.project, log).await)
                };
                return Err(ProvisioningError::StepFailed {
                    step: step_number,
                    kind,
                    source,
                    rollback,
                });
            }
        }
    }

    refetch(client, &ctx.project, log).await
}
