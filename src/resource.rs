use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Newtype wrappers keep project/region/zone/name strings from being swapped
/// when they travel together through request builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Project(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Zone(pub String);

/// The user-chosen `name` of a Compute resource, unique per collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName(pub String);

/// Provider-assigned canonical URL of a resource. Dependent resources point
/// at each other through these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelfLink(pub String);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_inner!(Project, Region, Zone, ResourceName, SelfLink);

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Where a resource lives below `projects/{project}/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    Global,
    Region(Region),
    Zone(Zone),
}

impl Location {
    /// URL path segment for this location, e.g. `zones/us-central1-a`.
    pub fn path(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Region(region) => format!("regions/{region}"),
            Self::Zone(zone) => format!("zones/{zone}"),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Which kind of location a resource kind is addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Regional,
    Zonal,
}

/// A Compute Engine resource type handled by this plugin.
///
/// Every kind maps to the REST collection it lives in, the scope used to
/// address it, and the request property naming it (`healthCheck`,
/// `urlMap`, ...). Instance groups are only ever looked up or listed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    HealthCheck,
    BackendService,
    UrlMap,
    TargetHttpProxy,
    TargetHttpsProxy,
    ForwardingRule,
    Address,
    BackendBucket,
    SslCertificate,
    SslPolicy,
    TargetInstance,
    TargetPool,
    InstanceGroup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        Self::HealthCheck,
        Self::BackendService,
        Self::UrlMap,
        Self::TargetHttpProxy,
        Self::TargetHttpsProxy,
        Self::ForwardingRule,
        Self::Address,
        Self::BackendBucket,
        Self::SslCertificate,
        Self::SslPolicy,
        Self::TargetInstance,
        Self::TargetPool,
        Self::InstanceGroup,
    ];

    /// Request property that addresses a single resource of this kind by name.
    pub fn type_property(self) -> &'static str {
        match self {
            Self::HealthCheck => "healthCheck",
            Self::BackendService => "backendService",
            Self::UrlMap => "urlMap",
            Self::TargetHttpProxy => "targetHttpProxy",
            Self::TargetHttpsProxy => "targetHttpsProxy",
            Self::ForwardingRule => "forwardingRule",
            Self::Address => "address",
            Self::BackendBucket => "backendBucket",
            Self::SslCertificate => "sslCertificate",
            Self::SslPolicy => "sslPolicy",
            Self::TargetInstance => "targetInstance",
            Self::TargetPool => "targetPool",
            Self::InstanceGroup => "instanceGroup",
        }
    }

    /// REST collection segment.
    pub fn collection(self) -> &'static str {
        match self {
            Self::HealthCheck => "healthChecks",
            Self::BackendService => "backendServices",
            Self::UrlMap => "urlMaps",
            Self::TargetHttpProxy => "targetHttpProxies",
            Self::TargetHttpsProxy => "targetHttpsProxies",
            Self::ForwardingRule => "forwardingRules",
            Self::Address => "addresses",
            Self::BackendBucket => "backendBuckets",
            Self::SslCertificate => "sslCertificates",
            Self::SslPolicy => "sslPolicies",
            Self::TargetInstance => "targetInstances",
            Self::TargetPool => "targetPools",
            Self::InstanceGroup => "instanceGroups",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::Address | Self::TargetPool => Scope::Regional,
            Self::TargetInstance | Self::InstanceGroup => Scope::Zonal,
            _ => Scope::Global,
        }
    }

    /// The `kind` string the provider reports on fetched resources.
    pub fn provider_kind(self) -> &'static str {
        match self {
            Self::HealthCheck => "compute#healthCheck",
            Self::BackendService => "compute#backendService",
            Self::UrlMap => "compute#urlMap",
            Self::TargetHttpProxy => "compute#targetHttpProxy",
            Self::TargetHttpsProxy => "compute#targetHttpsProxy",
            Self::ForwardingRule => "compute#forwardingRule",
            Self::Address => "compute#address",
            Self::BackendBucket => "compute#backendBucket",
            Self::SslCertificate => "compute#sslCertificate",
            Self::SslPolicy => "compute#sslPolicy",
            Self::TargetInstance => "compute#targetInstance",
            Self::TargetPool => "compute#targetPool",
            Self::InstanceGroup => "compute#instanceGroup",
        }
    }

    pub fn is_creatable(self) -> bool {
        self != Self::InstanceGroup
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_property())
    }
}

/// Addresses one existing resource: the `{ [typeProperty]: name }` request
/// plus the project and location it is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub project: Project,
    pub location: Location,
    pub name: ResourceName,
}

impl ResourceRef {
    pub fn new(
        kind: ResourceKind,
        project: Project,
        location: Location,
        name: impl Into<ResourceName>,
    ) -> Self {
        Self {
            kind,
            project,
            location,
            name: name.into(),
        }
    }

    /// Path of this resource below `compute/v1/`.
    pub fn path(&self) -> String {
        format!(
            "projects/{}/{}/{}/{}",
            self.project,
            self.location.path(),
            self.kind.collection(),
            self.name
        )
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Provider payload for a single create call. Produced fresh per
/// invocation and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    pub kind: ResourceKind,
    pub body: Value,
}

impl ResourceDefinition {
    pub fn new(kind: ResourceKind, body: Value) -> Self {
        Self { kind, body }
    }

    /// The declared `name` of the resource, if the payload carries one.
    pub fn name(&self) -> Option<ResourceName> {
        self.body
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(ResourceName::from)
    }
}

/// A resource whose create operation was observed reaching `DONE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResource {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub location: Location,
}

impl CreatedResource {
    pub fn reference(&self, project: &Project) -> ResourceRef {
        ResourceRef::new(
            self.kind,
            project.clone(),
            self.location.clone(),
            self.name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn every_kind_has_a_distinct_collection() {
        let mut collections: Vec<_> = ResourceKind::ALL.iter().map(|k| k.collection()).collect();
        collections.sort();
        collections.dedup();
        assert_eq!(collections.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn scopes_follow_the_compute_api() {
        assert_eq!(ResourceKind::ForwardingRule.scope(), Scope::Global);
        assert_eq!(ResourceKind::TargetPool.scope(), Scope::Regional);
        assert_eq!(ResourceKind::Address.scope(), Scope::Regional);
        assert_eq!(ResourceKind::TargetInstance.scope(), Scope::Zonal);
        assert_eq!(ResourceKind::InstanceGroup.scope(), Scope::Zonal);
    }

    #[test]
    fn only_instance_groups_are_lookup_only() {
        let lookup_only: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(|k| !k.is_creatable())
            .collect();
        assert_eq!(lookup_only, vec![ResourceKind::InstanceGroup]);
    }

    #[test]
    fn reference_path_includes_location() {
        let reference = ResourceRef::new(
            ResourceKind::InstanceGroup,
            Project("acme".into()),
            Location::Zone(Zone("us-central1-a".into())),
            "web-ig",
        );
        assert_eq!(
            reference.path(),
            "projects/acme/zones/us-central1-a/instanceGroups/web-ig"
        );
        assert_eq!(reference.to_string(), "instanceGroup web-ig");
    }

    #[test]
    fn definition_name_reads_payload() {
        let def = ResourceDefinition::new(ResourceKind::UrlMap, json!({ "name": "web-map" }));
        assert_eq!(def.name(), Some(ResourceName("web-map".into())));

        let unnamed = ResourceDefinition::new(ResourceKind::UrlMap, json!({ "name": "" }));
        assert_eq!(unnamed.name(), None);
    }

    #[test]
    fn kind_serializes_as_type_property() {
        for kind in ResourceKind::ALL {
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.type_property())
            );
        }
    }
}
