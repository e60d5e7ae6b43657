use serde_json::{Value, json};
use tracing::debug;

use crate::clients::client::{ClientError, ResourceClient};
use crate::orchestrator::ProvisioningContext;
use crate::resource::{ResourceDefinition, ResourceKind, ResourceName, ResourceRef, SelfLink};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A dependency could not be fetched: not found, wrong zone/region, or
    /// not authorized.
    #[error("could not resolve {kind} {name:?}: {source}")]
    Unresolved {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("{kind} {name:?} has no selfLink")]
    MissingSelfLink { kind: ResourceKind, name: String },

    #[error("{0} is regional but no region was given")]
    MissingRegion(ResourceKind),

    #[error("{0} payload has no name")]
    Unnamed(ResourceKind),

    #[error("forwarding rule needs an HTTP or HTTPS proxy name")]
    MissingTarget,

    #[error("HTTPS proxy needs an SSL certificate name")]
    MissingCertificate,

    #[error("unsupported health check type {0:?}")]
    UnsupportedProbe(String),
}

/// Fetch an existing resource and return its self link.
async fn resolve(
    client: &ResourceClient,
    ctx: &ProvisioningContext,
    kind: ResourceKind,
    name: &ResourceName,
) -> Result<SelfLink, BuildError> {
    let location = ctx.location_for(kind).ok_or(BuildError::MissingRegion(kind))?;
    let reference = ResourceRef::new(kind, ctx.project.clone(), location, name.clone());
    debug!(%kind, %name, "resolving dependency");

    let resource = client
        .get(&reference)
        .await
        .map_err(|source| BuildError::Unresolved {
            kind,
            name: name.0.clone(),
            source,
        })?;
    resource
        .get("selfLink")
        .and_then(Value::as_str)
        .map(|link| SelfLink(link.to_string()))
        .ok_or_else(|| BuildError::MissingSelfLink {
            kind,
            name: name.0.clone(),
        })
}

/// Request field carrying the probe config for a health check protocol.
fn probe_field(health_check_type: &str) -> Option<&'static str> {
    match health_check_type {
        "HTTP" => Some("httpHealthCheck"),
        "HTTPS" => Some("httpsHealthCheck"),
        "HTTP2" => Some("http2HealthCheck"),
        "TCP" => Some("tcpHealthCheck"),
        "SSL" => Some("sslHealthCheck"),
        "GRPC" => Some("grpcHealthCheck"),
        _ => None,
    }
}

/// Assembles the create payload for one load-balancer step. Every
/// dependency is resolved with a `get` against the client, so a build only
/// succeeds once the resources it points at exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionBuilder {
    HealthCheck,
    BackendService,
    UrlMap,
    TargetHttpProxy,
    TargetHttpsProxy,
    ForwardingRule,
}

impl DefinitionBuilder {
    pub fn kind(self) -> ResourceKind {
        match self {
            Self::HealthCheck => ResourceKind::HealthCheck,
            Self::BackendService => ResourceKind::BackendService,
            Self::UrlMap => ResourceKind::UrlMap,
            Self::TargetHttpProxy => ResourceKind::TargetHttpProxy,
            Self::TargetHttpsProxy => ResourceKind::TargetHttpsProxy,
            Self::ForwardingRule => ResourceKind::ForwardingRule,
        }
    }

    pub async fn build(
        self,
        client: &ResourceClient,
        ctx: &ProvisioningContext,
    ) -> Result<ResourceDefinition, BuildError> {
        let p = &ctx.params;
        let body = match self {
            Self::HealthCheck => {
                let field = probe_field(&p.health_check_type)
                    .ok_or_else(|| BuildError::UnsupportedProbe(p.health_check_type.clone()))?;
                let mut body = json!({
                    "name": p.health_check_name,
                    "type": p.health_check_type,
                });
                body[field] = json!({});
                body
            }
            Self::BackendService => {
                let group =
                    resolve(client, ctx, ResourceKind::InstanceGroup, &p.instance_group_name).await?;
                let health_check =
                    resolve(client, ctx, ResourceKind::HealthCheck, &p.health_check_name).await?;
                json!({
                    "name": p.backend_service_name,
                    "backends": [{ "group": group }],
                    "healthChecks": [health_check],
                })
            }
            Self::UrlMap => {
                let service =
                    resolve(client, ctx, ResourceKind::BackendService, &p.backend_service_name)
                        .await?;
                json!({
                    "name": p.url_map_name,
                    "defaultService": service,
                })
            }
            Self::TargetHttpProxy => {
                let name = p.http_proxy_name.as_ref().ok_or(BuildError::MissingTarget)?;
                let url_map = resolve(client, ctx, ResourceKind::UrlMap, &p.url_map_name).await?;
                json!({
                    "name": name,
                    "urlMap": url_map,
                })
            }
            Self::TargetHttpsProxy => {
                let name = p.https_proxy_name.as_ref().ok_or(BuildError::MissingTarget)?;
                let certificate_name = p
                    .ssl_certificate_name
                    .as_ref()
                    .ok_or(BuildError::MissingCertificate)?;
                let certificate =
                    resolve(client, ctx, ResourceKind::SslCertificate, certificate_name).await?;
                let url_map = resolve(client, ctx, ResourceKind::UrlMap, &p.url_map_name).await?;
                json!({
                    "name": name,
                    "urlMap": url_map,
                    "sslCertificates": [certificate],
                })
            }
            Self::ForwardingRule => {
                let (kind, proxy) = match (&p.http_proxy_name, &p.https_proxy_name) {
                    (Some(name), _) => (ResourceKind::TargetHttpProxy, name),
                    (None, Some(name)) => (ResourceKind::TargetHttpsProxy, name),
                    (None, None) => return Err(BuildError::MissingTarget),
                };
                let target = resolve(client, ctx, kind, proxy).await?;
                json!({
                    "name": p.forwarding_rule_name,
                    "target": target,
                    "portRange": p.port_range,
                    "loadBalancingScheme": "EXTERNAL",
                })
            }
        };
        Ok(ResourceDefinition::new(self.kind(), body))
    }
}
