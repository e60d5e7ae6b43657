use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::clients::client::{ClientError, ResourceClient};
use crate::loadbalancer::{self, Flavor, LoadBalancerError};
use crate::operation::{self, OperationError};
use crate::orchestrator::{ProvisioningContext, ProvisioningError};
use crate::params::{ActionRequest, LoadBalancerParams, ParamError};
use crate::resource::{Location, Project, ResourceDefinition, ResourceKind, ResourceRef, Scope};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error(transparent)]
    Params(#[from] ParamError),

    #[error("{0} payload has no name")]
    Unnamed(ResourceKind),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("encoding action output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<LoadBalancerError> for ActionError {
    fn from(e: LoadBalancerError) -> Self {
        match e {
            LoadBalancerError::Params(e) => Self::Params(e),
            LoadBalancerError::Provisioning(e) => Self::Provisioning(e),
        }
    }
}

/// Method and parameter names the platform uses for one resource kind.
struct KindActions {
    /// `(method, JSON payload parameter)`
    create: Option<(&'static str, &'static str)>,
    /// `(method, name parameter)`
    delete: Option<(&'static str, &'static str)>,
    list: &'static str,
}

fn kind_actions(kind: ResourceKind) -> KindActions {
    use ResourceKind::*;
    let (create, delete, list) = match kind {
        HealthCheck => (
            ("createHealthCheckFromJSON", "healthCheckJSON"),
            ("deleteHealthCheck", "healthCheckName"),
            "listHealthChecksAuto",
        ),
        BackendService => (
            ("createBackendServiceFromJSON", "backendServiceJSON"),
            ("deleteBackendService", "backendServiceName"),
            "listBackendServicesAuto",
        ),
        UrlMap => (
            ("createURLMapFromJSON", "urlMapJSON"),
            ("deleteUrlMap", "urlMapName"),
            "listUrlMapsAuto",
        ),
        TargetHttpProxy => (
            ("createTargetHttpProxyFromJSON", "targetHttpProxyJSON"),
            ("deleteTargetHttpProxy", "targetHttpProxyName"),
            "listTargetHttpProxyAuto",
        ),
        TargetHttpsProxy => (
            ("createTargetHttpsProxyFromJSON", "targetHttpsProxyJSON"),
            ("deleteTargetHttpsProxy", "targetHttpsProxyName"),
            "listTargetHttpsProxyAuto",
        ),
        ForwardingRule => (
            ("createForwardRulesFromJSON", "forwardRulesJSON"),
            ("deleteForwardingRules", "forwardingRuleName"),
            "listForwardingRulesAuto",
        ),
        Address => (
            ("createAddressFromJSON", "addressJSON"),
            ("deleteAddress", "addressName"),
            "listAddressesAuto",
        ),
        BackendBucket => (
            ("createBackendBucketFromJSON", "backendBucketJSON"),
            ("deleteBackendBucket", "backendBucketName"),
            "listBackendBucketsAuto",
        ),
        SslCertificate => (
            ("createSslCertificateFromJSON", "sslCertificateJSON"),
            ("deleteSslCertificate", "sslCertificateName"),
            "listSslCertificatesAuto",
        ),
        SslPolicy => (
            ("createSslPolicyFromJSON", "sslPolicyJSON"),
            ("deleteSslPolicy", "sslPolicyName"),
            "listSslPoliciesAuto",
        ),
        TargetInstance => (
            ("createTargetInstanceFromJSON", "targetInstanceJSON"),
            ("deleteTargetInstance", "targetInstanceName"),
            "listTargetInstancesAuto",
        ),
        TargetPool => (
            ("createTargetPoolFromJSON", "targetPoolJSON"),
            ("deleteTargetPool", "targetPoolName"),
            "listTargetPoolsAuto",
        ),
        InstanceGroup => {
            return KindActions {
                create: None,
                delete: None,
                list: "listInstanceGroupsAuto",
            };
        }
    };
    KindActions {
        create: Some(create),
        delete: Some(delete),
        list,
    }
}

/// Every action the plugin answers to, resolved from its method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateHttpExternalLoadBalancer,
    CreateHttpsExternalLoadBalancer,
    CreateFromJson(ResourceKind),
    Delete(ResourceKind),
    ListAuto(ResourceKind),
    ListProjectsAuto,
    ListRegionsAuto,
    ListZonesAuto,
}

impl Action {
    pub fn from_method(method: &str) -> Result<Self, ActionError> {
        match method {
            "createHttpExternalLoadBalancer" => return Ok(Self::CreateHttpExternalLoadBalancer),
            "createHttpsExternalLoadBalancer" => return Ok(Self::CreateHttpsExternalLoadBalancer),
            "listProjectsAuto" => return Ok(Self::ListProjectsAuto),
            "listRegionsAuto" => return Ok(Self::ListRegionsAuto),
            "listZonesAuto" => return Ok(Self::ListZonesAuto),
            _ => {}
        }
        ResourceKind::ALL
            .into_iter()
            .find_map(|kind| {
                let names = kind_actions(kind);
                if names.create.is_some_and(|(m, _)| m == method) {
                    Some(Self::CreateFromJson(kind))
                } else if names.delete.is_some_and(|(m, _)| m == method) {
                    Some(Self::Delete(kind))
                } else if names.list == method {
                    Some(Self::ListAuto(kind))
                } else {
                    None
                }
            })
            .ok_or_else(|| ActionError::UnknownAction(method.to_string()))
    }

    pub fn method(self) -> &'static str {
        match self {
            Self::CreateHttpExternalLoadBalancer => "createHttpExternalLoadBalancer",
            Self::CreateHttpsExternalLoadBalancer => "createHttpsExternalLoadBalancer",
            Self::ListProjectsAuto => "listProjectsAuto",
            Self::ListRegionsAuto => "listRegionsAuto",
            Self::ListZonesAuto => "listZonesAuto",
            Self::CreateFromJson(kind) => kind_actions(kind).create.map_or("", |(m, _)| m),
            Self::Delete(kind) => kind_actions(kind).delete.map_or("", |(m, _)| m),
            Self::ListAuto(kind) => kind_actions(kind).list,
        }
    }

    /// Every action reachable through `from_method`.
    pub fn all() -> Vec<Action> {
        let mut actions = vec![
            Self::CreateHttpExternalLoadBalancer,
            Self::CreateHttpsExternalLoadBalancer,
            Self::ListProjectsAuto,
            Self::ListRegionsAuto,
            Self::ListZonesAuto,
        ];
        for kind in ResourceKind::ALL {
            if kind.is_creatable() {
                actions.push(Self::CreateFromJson(kind));
                actions.push(Self::Delete(kind));
            }
            actions.push(Self::ListAuto(kind));
        }
        actions
    }
}

/// One autocomplete option. `id` is what the platform sends back as the
/// parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutocompleteItem {
    pub id: String,
    pub value: String,
}

/// Location for a single-resource action, from the zone/region params.
fn location_for(kind: ResourceKind, request: &ActionRequest) -> Result<Location, ActionError> {
    Ok(match kind.scope() {
        Scope::Global => Location::Global,
        Scope::Regional => Location::Region(request.region()?.ok_or(ParamError::Missing("region"))?),
        Scope::Zonal => Location::Zone(request.zone()?),
    })
}

/// Create one resource from a raw provider payload, wait for it, and return
/// the fetched resource.
pub async fn create_from_json(
    client: &ResourceClient,
    kind: ResourceKind,
    request: &ActionRequest,
    project: Project,
) -> Result<Value, ActionError> {
    let payload_param = kind_actions(kind)
        .create
        .map(|(_, param)| param)
        .ok_or_else(|| ActionError::UnknownAction(format!("create {kind}")))?;
    let definition = ResourceDefinition::new(kind, request.json_object(payload_param)?);
    let name = definition.name().ok_or(ActionError::Unnamed(kind))?;
    let location = location_for(kind, request)?;

    info!(%kind, %name, %location, "creating resource");
    let handle = client.create(&project, &location, &definition).await?;
    operation::wait_until_done(client, handle).await?;
    Ok(client
        .get(&ResourceRef::new(kind, project, location, name))
        .await?)
}

/// Delete one resource by name and wait for the deletion. Dependents are the
/// caller's concern.
pub async fn delete_resource(
    client: &ResourceClient,
    kind: ResourceKind,
    request: &ActionRequest,
    project: Project,
) -> Result<(), ActionError> {
    let name_param = kind_actions(kind)
        .delete
        .map(|(_, param)| param)
        .ok_or_else(|| ActionError::UnknownAction(format!("delete {kind}")))?;
    let name = request.name(name_param)?;
    let location = location_for(kind, request)?;

    info!(%kind, %name, %location, "deleting resource");
    let handle = client
        .delete(&ResourceRef::new(kind, project, location, name))
        .await?;
    operation::wait_until_done(client, handle).await?;
    Ok(())
}

fn matching(query: Option<&str>, names: impl IntoIterator<Item = String>) -> Vec<AutocompleteItem> {
    let query = query.map(str::to_lowercase).filter(|q| !q.is_empty());
    names
        .into_iter()
        .filter(|name| {
            query
                .as_deref()
                .is_none_or(|q| name.to_lowercase().contains(q))
        })
        .map(|name| AutocompleteItem {
            id: name.clone(),
            value: name,
        })
        .collect()
}

pub async fn list_auto(
    client: &ResourceClient,
    kind: ResourceKind,
    request: &ActionRequest,
    project: Project,
) -> Result<Vec<AutocompleteItem>, ActionError> {
    let location = location_for(kind, request)?;
    let listed = client.list(kind, &project, &location).await?;
    Ok(matching(
        request.query.as_deref(),
        listed.into_iter().map(|r| r.name),
    ))
}

/// Projects the credentials can see, matched on id or display name.
pub async fn list_projects_auto(
    client: &ResourceClient,
    request: &ActionRequest,
) -> Result<Vec<AutocompleteItem>, ActionError> {
    let query = request
        .query
        .as_deref()
        .map(str::to_lowercase)
        .filter(|q| !q.is_empty());
    let listed = client.list_projects().await?;
    Ok(listed
        .into_iter()
        .filter(|p| {
            query.as_deref().is_none_or(|q| {
                p.id.to_lowercase().contains(q) || p.name.to_lowercase().contains(q)
            })
        })
        .map(|p| AutocompleteItem {
            id: p.id,
            value: p.name,
        })
        .collect())
}

pub async fn list_regions_auto(
    client: &ResourceClient,
    request: &ActionRequest,
    project: Project,
) -> Result<Vec<AutocompleteItem>, ActionError> {
    let listed = client.list_regions(&project).await?;
    Ok(matching(
        request.query.as_deref(),
        listed.into_iter().map(|r| r.name),
    ))
}

/// Zones, narrowed to the `region` param when one is given.
pub async fn list_zones_auto(
    client: &ResourceClient,
    request: &ActionRequest,
    project: Project,
) -> Result<Vec<AutocompleteItem>, ActionError> {
    let region = request.region()?;
    let listed = client.list_zones(&project).await?;
    let zones = listed
        .into_iter()
        .map(|r| r.name)
        .filter(|zone| region.as_ref().is_none_or(|r| zone.starts_with(&r.0)));
    Ok(matching(request.query.as_deref(), zones))
}

async fn create_load_balancer(
    client: &ResourceClient,
    flavor: Flavor,
    request: &ActionRequest,
    project: Project,
) -> Result<Value, ActionError> {
    let ctx = ProvisioningContext {
        project,
        zone: request.zone()?,
        region: request.region()?,
        params: LoadBalancerParams::from_request(request)?,
    };
    let result = loadbalancer::create_load_balancer(client, flavor, &ctx).await?;
    Ok(Value::Object(result.0.into_iter().collect()))
}

/// Run `action` against `client`. `default_project` is used when neither the
/// params nor the settings name a project. Project listings need none.
pub async fn dispatch(
    client: &ResourceClient,
    action: Action,
    request: &ActionRequest,
    default_project: Option<&str>,
) -> Result<Value, ActionError> {
    let project = || request.project(default_project);
    match action {
        Action::CreateHttpExternalLoadBalancer => {
            create_load_balancer(client, Flavor::Http, request, project()?).await
        }
        Action::CreateHttpsExternalLoadBalancer => {
            create_load_balancer(client, Flavor::Https, request, project()?).await
        }
        Action::CreateFromJson(kind) => create_from_json(client, kind, request, project()?).await,
        Action::Delete(kind) => {
            delete_resource(client, kind, request, project()?).await?;
            Ok(Value::Null)
        }
        Action::ListAuto(kind) => Ok(serde_json::to_value(
            list_auto(client, kind, request, project()?).await?,
        )?),
        Action::ListProjectsAuto => Ok(serde_json::to_value(
            list_projects_auto(client, request).await?,
        )?),
        Action::ListRegionsAuto => Ok(serde_json::to_value(
            list_regions_auto(client, request, project()?).await?,
        )?),
        Action::ListZonesAuto => Ok(serde_json::to_value(
            list_zones_auto(client, request, project()?).await?,
        )?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::clients::fake::{Call, FakeClient};
    use crate::resource::Zone;

    #[test]
    fn every_method_name_resolves_back() {
        let actions = Action::all();
        assert_eq!(actions.len(), 5 + 12 * 2 + 13);
        for action in actions {
            assert_eq!(Action::from_method(action.method()).unwrap(), action);
        }
    }

    #[test]
    fn historical_method_names_are_kept() {
        assert_eq!(
            Action::from_method("createURLMapFromJSON").unwrap(),
            Action::CreateFromJson(ResourceKind::UrlMap)
        );
        assert_eq!(
            Action::from_method("deleteForwardingRules").unwrap(),
            Action::Delete(ResourceKind::ForwardingRule)
        );
        assert_eq!(
            Action::from_method("createTargetInstanceFromJSON").unwrap(),
            Action::CreateFromJson(ResourceKind::TargetInstance)
        );
        assert!(matches!(
            Action::from_method("createInstanceGroupFromJSON"),
            Err(ActionError::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn create_from_json_returns_fetched_resource() {
        let fake = FakeClient::new();
        let client = ResourceClient::Fake(fake.clone());
        let request = ActionRequest::new(json!({
            "project": "acme",
            "zone": "us-central1-a",
            "targetInstanceJSON": r#"{"name": "ti-1", "instance": "vm-1"}"#,
        }));

        let created = dispatch(
            &client,
            Action::CreateFromJson(ResourceKind::TargetInstance),
            &request,
            None,
        )
        .await
        .unwrap();
        assert_eq!(created["kind"], "compute#targetInstance");
        assert!(
            created["selfLink"]
                .as_str()
                .unwrap()
                .ends_with("/zones/us-central1-a/targetInstances/ti-1")
        );
        assert!(matches!(fake.calls().last(), Some(Call::Get { .. })));
    }

    #[tokio::test]
    async fn regional_create_needs_region() {
        let client = ResourceClient::Fake(FakeClient::new());
        let request = ActionRequest::new(json!({
            "project": "acme",
            "addressJSON": { "name": "ip-1" },
        }));
        let err = dispatch(&client, Action::CreateFromJson(ResourceKind::Address), &request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Params(ParamError::Missing("region"))));
    }

    #[tokio::test]
    async fn unnamed_payload_is_rejected_before_create() {
        let fake = FakeClient::new();
        let client = ResourceClient::Fake(fake.clone());
        let request = ActionRequest::new(json!({
            "project": "acme",
            "sslPolicyJSON": { "profile": "MODERN" },
        }));
        let err = dispatch(&client, Action::CreateFromJson(ResourceKind::SslPolicy), &request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unnamed(ResourceKind::SslPolicy)));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let zone = Location::Zone(Zone("us-central1-a".into()));
        let fake = ["web-ig", "batch-ig", "web-canary"]
            .into_iter()
            .fold(FakeClient::new(), |fake, name| {
                fake.with_resource(ResourceRef::new(
                    ResourceKind::InstanceGroup,
                    Project("acme".into()),
                    zone.clone(),
                    name,
                ))
            });
        let client = ResourceClient::Fake(fake);
        let mut request = ActionRequest::new(json!({ "zone": "us-central1-a" }));
        request.query = Some("WEB".into());

        let items = list_auto(&client, ResourceKind::InstanceGroup, &request, Project("acme".into()))
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["web-canary", "web-ig"]);
    }

    #[tokio::test]
    async fn zones_narrow_to_region() {
        let fake = FakeClient::new().with_zones(&["us-central1-a", "us-central1-b", "europe-west1-b"]);
        let client = ResourceClient::Fake(fake);
        let request = ActionRequest::new(json!({ "region": { "id": "us-central1", "value": "Iowa" } }));

        let items = list_zones_auto(&client, &request, Project("acme".into()))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.value.starts_with("us-central1")));
    }

    #[tokio::test]
    async fn regions_are_listed_and_filtered() {
        let fake = FakeClient::new().with_regions(&["us-central1", "us-east1", "europe-west1"]);
        let client = ResourceClient::Fake(fake.clone());
        let mut request = ActionRequest::new(json!({ "project": "acme" }));
        request.query = Some("US-".into());

        let output = dispatch(&client, Action::ListRegionsAuto, &request, None)
            .await
            .unwrap();
        assert_eq!(
            output,
            json!([
                { "id": "us-central1", "value": "us-central1" },
                { "id": "us-east1", "value": "us-east1" },
            ])
        );
        assert_eq!(fake.calls(), vec![Call::ListRegions]);
    }

    #[tokio::test]
    async fn projects_need_no_project_param() {
        let fake = FakeClient::new().with_projects(&[
            ("acme-prod", "Acme Production"),
            ("acme-dev", "Acme Dev"),
            ("billing", "Billing"),
        ]);
        let client = ResourceClient::Fake(fake);
        let mut request = ActionRequest::default();
        request.query = Some("production".into());

        let output = dispatch(&client, Action::ListProjectsAuto, &request, None)
            .await
            .unwrap();
        assert_eq!(output, json!([{ "id": "acme-prod", "value": "Acme Production" }]));
    }

    #[tokio::test]
    async fn missing_project_fails_without_calls() {
        let fake = FakeClient::new();
        let client = ResourceClient::Fake(fake.clone());
        let err = dispatch(&client, Action::ListRegionsAuto, &ActionRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Params(ParamError::Missing("project"))));
        assert!(fake.calls().is_empty());
    }
}
