use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};

use crate::clients::client::{ClientError, ListedResource};
use crate::operation::{OperationErrors, OperationHandle, OperationStatus};
use crate::resource::{Location, Project, ResourceDefinition, ResourceKind, ResourceRef};

const SELF_LINK_BASE: &str = "https://www.googleapis.com/compute/v1";
const CREATION_TIMESTAMP: &str = "2026-01-01T00:00:00.000-08:00";

/// What happens on the next `create()` of a given kind.
#[derive(Debug, Clone)]
pub enum CreateBehavior {
    /// Resource is stored; the operation finishes cleanly on the next wait.
    Succeed,
    /// The insert is rejected outright (validation, quota, ...).
    Reject(String),
    /// The insert is accepted but the operation finishes with an error block.
    OperationFails(String),
}

/// What happens on the next `get()` of a given kind.
#[derive(Debug, Clone)]
pub enum GetBehavior {
    /// The stored resource is returned, or `NotFound`.
    Succeed,
    /// The read fails with a provider error.
    Fail(String),
}

/// What happens on the next `delete()` of a given kind.
#[derive(Debug, Clone)]
pub enum DeleteBehavior {
    /// Resource is removed.
    Succeed,
    /// The delete request is rejected, e.g. resource still in use.
    Reject(String),
    /// The delete is accepted but the operation finishes with an error block.
    /// The resource stays.
    OperationFails(String),
}

/// What the next `wait_operation()` poll returns.
#[derive(Debug, Clone)]
pub enum WaitBehavior {
    /// Operation reports DONE (with its recorded outcome).
    Done,
    /// Operation is still RUNNING; the caller has to poll again.
    StillRunning,
    /// The poll call itself fails.
    Fail(String),
}

/// Logged record of every call that reached the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { kind: ResourceKind, name: String },
    Get { kind: ResourceKind, name: String },
    Delete { kind: ResourceKind, name: String },
    List { kind: ResourceKind },
    ListRegions,
    ListZones,
    ListProjects,
    Wait { operation: String },
}

/// Interior state behind the Arc<Mutex<_>>.
#[derive(Debug)]
struct FakeClientState {
    /// Stored resources keyed by self link.
    resources: BTreeMap<String, Value>,
    regions: Vec<String>,
    zones: Vec<String>,
    /// `(project id, display name)`.
    projects: Vec<(String, String)>,
    create_behaviors: HashMap<ResourceKind, VecDeque<CreateBehavior>>,
    get_behaviors: HashMap<ResourceKind, VecDeque<GetBehavior>>,
    delete_behaviors: HashMap<ResourceKind, VecDeque<DeleteBehavior>>,
    wait_behaviors: VecDeque<WaitBehavior>,
    default_create: CreateBehavior,
    /// Error block each issued operation reports once DONE.
    operations: HashMap<String, Option<OperationErrors>>,
    calls: Vec<Call>,
}

/// A deterministic, in-memory Compute API for exercising provisioning and
/// rollback paths.
///
/// Create/get/delete behaviors are queued per resource kind. An empty create
/// queue falls back to the configured default; gets and deletes succeed. Waits pop from a single queue and
/// default to `Done`.
#[derive(Debug, Clone)]
pub struct FakeClient {
    state: Arc<Mutex<FakeClientState>>,
    next_id: Arc<AtomicU64>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

fn self_link(reference: &ResourceRef) -> String {
    format!("{SELF_LINK_BASE}/{}", reference.path())
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeClientState {
                resources: BTreeMap::new(),
                regions: Vec::new(),
                zones: Vec::new(),
                projects: Vec::new(),
                create_behaviors: HashMap::new(),
                get_behaviors: HashMap::new(),
                delete_behaviors: HashMap::new(),
                wait_behaviors: VecDeque::new(),
                default_create: CreateBehavior::Succeed,
                operations: HashMap::new(),
                calls: Vec::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Builder methods ──────────────────────────────────────────────

    /// Seed an existing resource (instance group, certificate, ...) without
    /// logging a call.
    pub fn with_resource(self, reference: ResourceRef) -> Self {
        let body = self.materialize(&reference, json!({ "name": reference.name.0 }));
        self.state().resources.insert(self_link(&reference), body);
        self
    }

    pub fn with_regions(self, regions: &[&str]) -> Self {
        self.state().regions = regions.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_zones(self, zones: &[&str]) -> Self {
        self.state().zones = zones.iter().map(|z| z.to_string()).collect();
        self
    }

    pub fn with_projects(self, projects: &[(&str, &str)]) -> Self {
        self.state().projects = projects
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        self
    }

    pub fn on_create(self, kind: ResourceKind, behavior: CreateBehavior) -> Self {
        self.state()
            .create_behaviors
            .entry(kind)
            .or_default()
            .push_back(behavior);
        self
    }

    pub fn on_get(self, kind: ResourceKind, behavior: GetBehavior) -> Self {
        self.state()
            .get_behaviors
            .entry(kind)
            .or_default()
            .push_back(behavior);
        self
    }

    pub fn on_delete(self, kind: ResourceKind, behavior: DeleteBehavior) -> Self {
        self.state()
            .delete_behaviors
            .entry(kind)
            .or_default()
            .push_back(behavior);
        self
    }

    pub fn on_next_wait(self, behavior: WaitBehavior) -> Self {
        self.state().wait_behaviors.push_back(behavior);
        self
    }

    pub fn with_default_create(self, behavior: CreateBehavior) -> Self {
        self.state().default_create = behavior;
        self
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Kinds of every create call, in call order.
    pub fn creates(&self) -> Vec<ResourceKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// `(kind, name)` of every delete call, in call order.
    pub fn deletes(&self) -> Vec<(ResourceKind, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { kind, name } => Some((kind, name)),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, reference: &ResourceRef) -> bool {
        self.state().resources.contains_key(&self_link(reference))
    }

    pub fn resource_count(&self) -> usize {
        self.state().resources.len()
    }

    // ── Compute API ──────────────────────────────────────────────────

    /// Add the fields the provider assigns on insert.
    fn materialize(&self, reference: &ResourceRef, mut body: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(fields) = body.as_object_mut() {
            fields.insert("kind".into(), json!(reference.kind.provider_kind()));
            fields.insert("id".into(), json!(id.to_string()));
            fields.insert("selfLink".into(), json!(self_link(reference)));
            fields.insert("creationTimestamp".into(), json!(CREATION_TIMESTAMP));
        }
        body
    }

    fn start_operation(
        state: &mut FakeClientState,
        project: &Project,
        location: &Location,
        error: Option<OperationErrors>,
    ) -> OperationHandle {
        let name = format!("operation-{}", uuid::Uuid::new_v4());
        state.operations.insert(name.clone(), error);
        OperationHandle {
            name,
            project: project.clone(),
            location: location.clone(),
            status: OperationStatus::Running,
            error: None,
        }
    }

    pub async fn create(
        &self,
        project: &Project,
        location: &Location,
        definition: &ResourceDefinition,
    ) -> Result<OperationHandle, ClientError> {
        let kind = definition.kind;
        let name = definition.name().map(|n| n.0).unwrap_or_default();

        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.push(Call::Create {
            kind,
            name: name.clone(),
        });
        let behavior = state
            .create_behaviors
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| state.default_create.clone());

        match behavior {
            CreateBehavior::Reject(message) => Err(ClientError::Api {
                status: 400,
                message,
            }),
            CreateBehavior::OperationFails(message) => Ok(Self::start_operation(
                state,
                project,
                location,
                Some(OperationErrors::single("RESOURCE_OPERATION_FAILED", message)),
            )),
            CreateBehavior::Succeed => {
                if name.is_empty() {
                    return Err(ClientError::Api {
                        status: 400,
                        message: format!("{kind} payload is missing a name"),
                    });
                }
                let reference = ResourceRef::new(kind, project.clone(), location.clone(), name.as_str());
                let link = self_link(&reference);
                if state.resources.contains_key(&link) {
                    return Err(ClientError::Api {
                        status: 409,
                        message: format!("The resource '{}' already exists", reference.path()),
                    });
                }
                let body = self.materialize(&reference, definition.body.clone());
                state.resources.insert(link, body);
                Ok(Self::start_operation(state, project, location, None))
            }
        }
    }

    pub async fn get(&self, reference: &ResourceRef) -> Result<Value, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::Get {
            kind: reference.kind,
            name: reference.name.0.clone(),
        });
        let behavior = state
            .get_behaviors
            .get_mut(&reference.kind)
            .and_then(VecDeque::pop_front);
        if let Some(GetBehavior::Fail(message)) = behavior {
            return Err(ClientError::Api {
                status: 503,
                message,
            });
        }
        state
            .resources
            .get(&self_link(reference))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: reference.kind,
                name: reference.name.0.clone(),
            })
    }

    pub async fn delete(&self, reference: &ResourceRef) -> Result<OperationHandle, ClientError> {
        let kind = reference.kind;
        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.push(Call::Delete {
            kind,
            name: reference.name.0.clone(),
        });
        let behavior = state
            .delete_behaviors
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or(DeleteBehavior::Succeed);

        if let DeleteBehavior::Reject(message) = behavior {
            return Err(ClientError::Api {
                status: 400,
                message,
            });
        }

        let link = self_link(reference);
        if !state.resources.contains_key(&link) {
            return Err(ClientError::NotFound {
                kind,
                name: reference.name.0.clone(),
            });
        }

        let error = match behavior {
            DeleteBehavior::OperationFails(message) => {
                Some(OperationErrors::single("RESOURCE_OPERATION_FAILED", message))
            }
            _ => {
                state.resources.remove(&link);
                None
            }
        };
        Ok(Self::start_operation(
            state,
            &reference.project,
            &reference.location,
            error,
        ))
    }

    pub async fn list(
        &self,
        kind: ResourceKind,
        project: &Project,
        location: &Location,
    ) -> Result<Vec<ListedResource>, ClientError> {
        let prefix = format!(
            "{SELF_LINK_BASE}/projects/{project}/{}/{}/",
            location.path(),
            kind.collection()
        );
        let mut state = self.state();
        state.calls.push(Call::List { kind });
        Ok(state
            .resources
            .iter()
            .filter(|(link, _)| link.starts_with(&prefix))
            .map(|(_, body)| ListedResource {
                id: body["id"].as_str().unwrap_or_default().to_string(),
                name: body["name"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    pub async fn list_regions(&self, _project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::ListRegions);
        Ok(listed_locations(&state.regions, 1000))
    }

    pub async fn list_zones(&self, _project: &Project) -> Result<Vec<ListedResource>, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::ListZones);
        Ok(listed_locations(&state.zones, 2000))
    }

    pub async fn list_projects(&self) -> Result<Vec<ListedResource>, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::ListProjects);
        Ok(state
            .projects
            .iter()
            .map(|(id, name)| ListedResource {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    pub async fn wait_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::Wait {
            operation: handle.name.clone(),
        });
        match state.wait_behaviors.pop_front().unwrap_or(WaitBehavior::Done) {
            WaitBehavior::Done => Ok(OperationHandle {
                status: OperationStatus::Done,
                error: state.operations.get(&handle.name).cloned().flatten(),
                ..handle.clone()
            }),
            WaitBehavior::StillRunning => Ok(OperationHandle {
                status: OperationStatus::Running,
                ..handle.clone()
            }),
            WaitBehavior::Fail(message) => Err(ClientError::Api {
                status: 503,
                message,
            }),
        }
    }
}

fn listed_locations(names: &[String], id_base: u64) -> Vec<ListedResource> {
    names
        .iter()
        .zip(id_base..)
        .map(|(name, id)| ListedResource {
            id: id.to_string(),
            name: name.clone(),
        })
        .collect()
}
