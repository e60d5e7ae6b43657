use tracing::info;

use crate::clients::client::ResourceClient;
use crate::definition::DefinitionBuilder;
use crate::orchestrator::{self, ProvisioningContext, ProvisioningError, ProvisioningResult, ProvisioningStep};
use crate::params::{LoadBalancerParams, ParamError};

const HTTP_STEPS: [ProvisioningStep; 5] = [
    ProvisioningStep::new(DefinitionBuilder::HealthCheck),
    ProvisioningStep::new(DefinitionBuilder::BackendService),
    ProvisioningStep::new(DefinitionBuilder::UrlMap),
    ProvisioningStep::new(DefinitionBuilder::TargetHttpProxy),
    ProvisioningStep::new(DefinitionBuilder::ForwardingRule),
];

const HTTPS_STEPS: [ProvisioningStep; 5] = [
    ProvisioningStep::new(DefinitionBuilder::HealthCheck),
    ProvisioningStep::new(DefinitionBuilder::BackendService),
    ProvisioningStep::new(DefinitionBuilder::UrlMap),
    ProvisioningStep::new(DefinitionBuilder::TargetHttpsProxy),
    ProvisioningStep::new(DefinitionBuilder::ForwardingRule),
];

/// External global load balancer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Http,
    Https,
}

impl Flavor {
    /// Fixed creation order: health check, backend service, URL map, proxy,
    /// forwarding rule.
    pub fn steps(self) -> &'static [ProvisioningStep] {
        match self {
            Self::Http => &HTTP_STEPS,
            Self::Https => &HTTPS_STEPS,
        }
    }

    /// Reject parameter combinations before anything is created.
    pub fn validate(self, params: &LoadBalancerParams) -> Result<(), ParamError> {
        if params.http_proxy_name.is_some() && params.https_proxy_name.is_some() {
            return Err(ParamError::Conflict(
                "give either httpProxyName or httpsProxyName, not both",
            ));
        }
        match self {
            Self::Http => {
                if params.http_proxy_name.is_none() {
                    return Err(ParamError::Missing("httpProxyName"));
                }
            }
            Self::Https => {
                if params.https_proxy_name.is_none() {
                    return Err(ParamError::Missing("httpsProxyName"));
                }
                if params.ssl_certificate_name.is_none() {
                    return Err(ParamError::Missing("sslCertificateName"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadBalancerError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}

pub async fn create_load_balancer(
    client: &ResourceClient,
    flavor: Flavor,
    ctx: &ProvisioningContext,
) -> Result<ProvisioningResult, LoadBalancerError> {
    flavor.validate(&ctx.params)?;
    info!(?flavor, project = %ctx.project, zone = %ctx.zone, "creating external load balancer");
    let result = orchestrator::run(client, flavor.steps(), ctx).await?;
    info!(?flavor, resources = result.len(), "load balancer ready");
    Ok(result)
}

/// Health check, backend service, URL map, target HTTP proxy and global
/// forwarding rule.
pub async fn create_http_external_load_balancer(
    client: &ResourceClient,
    ctx: &ProvisioningContext,
) -> Result<ProvisioningResult, LoadBalancerError> {
    create_load_balancer(client, Flavor::Http, ctx).await
}

/// Same chain as HTTP with a target HTTPS proxy bound to an existing SSL
/// certificate.
pub async fn create_https_external_load_balancer(
    client: &ResourceClient,
    ctx: &ProvisioningContext,
) -> Result<ProvisioningResult, LoadBalancerError> {
    create_load_balancer(client, Flavor::Https, ctx).await
}
