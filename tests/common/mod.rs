#![allow(dead_code)]

use serde_json::{Value, json};

use gclb::clients::client::ResourceClient;
use gclb::clients::fake::FakeClient;
use gclb::orchestrator::ProvisioningContext;
use gclb::params::LoadBalancerParams;
use gclb::resource::{Location, Project, ResourceKind, ResourceRef, Zone};

pub const PROJECT: &str = "acme-prod";
pub const ZONE: &str = "us-central1-a";

pub fn project() -> Project {
    Project(PROJECT.into())
}

pub fn zone() -> Zone {
    Zone(ZONE.into())
}

pub fn reference(kind: ResourceKind, name: &str) -> ResourceRef {
    let location = match kind {
        ResourceKind::InstanceGroup | ResourceKind::TargetInstance => Location::Zone(zone()),
        _ => Location::Global,
    };
    ResourceRef::new(kind, project(), location, name)
}

/// A project that already has the instance group and certificate every
/// load balancer in these tests points at.
pub fn seeded_fake() -> FakeClient {
    FakeClient::new()
        .with_resource(reference(ResourceKind::InstanceGroup, "web-ig"))
        .with_resource(reference(ResourceKind::SslCertificate, "web-cert"))
}

pub fn client(fake: &FakeClient) -> ResourceClient {
    ResourceClient::Fake(fake.clone())
}

pub fn http_params() -> LoadBalancerParams {
    LoadBalancerParams {
        health_check_name: "web-hc".into(),
        health_check_type: "HTTP".into(),
        backend_service_name: "web-bs".into(),
        instance_group_name: "web-ig".into(),
        url_map_name: "web-map".into(),
        http_proxy_name: Some("web-http-proxy".into()),
        https_proxy_name: None,
        ssl_certificate_name: None,
        forwarding_rule_name: "web-fr".into(),
        port_range: "80".into(),
    }
}

pub fn https_params() -> LoadBalancerParams {
    LoadBalancerParams {
        http_proxy_name: None,
        https_proxy_name: Some("web-https-proxy".into()),
        ssl_certificate_name: Some("web-cert".into()),
        port_range: "443".into(),
        ..http_params()
    }
}

pub fn context(params: LoadBalancerParams) -> ProvisioningContext {
    ProvisioningContext {
        project: project(),
        zone: zone(),
        region: None,
        params,
    }
}

/// Action params for `create{Http,Https}ExternalLoadBalancer`, shaped the
/// way the platform sends them.
pub fn load_balancer_params(https: bool) -> Value {
    let port_range = if https { "443" } else { "80" };
    let mut params = json!({
        "project": { "id": PROJECT, "value": "ACME production" },
        "zone": { "id": ZONE, "value": ZONE },
        "healthCheckName": "web-hc",
        "type": "HTTP",
        "backendServiceName": "web-bs",
        "instanceGroupName": { "id": "web-ig", "value": "web-ig" },
        "urlMapName": "web-map",
        "forwardingRuleName": "web-fr",
        "forwardRulePortRange": port_range,
    });
    if https {
        params["httpsProxyName"] = json!("web-https-proxy");
        params["sslCertificateName"] = json!({ "id": "web-cert", "value": "web-cert" });
    } else {
        params["httpProxyName"] = json!("web-http-proxy");
    }
    params
}

/// `(kind, name)` the HTTP flavor creates, in creation order.
pub fn http_chain() -> Vec<(ResourceKind, String)> {
    [
        (ResourceKind::HealthCheck, "web-hc"),
        (ResourceKind::BackendService, "web-bs"),
        (ResourceKind::UrlMap, "web-map"),
        (ResourceKind::TargetHttpProxy, "web-http-proxy"),
        (ResourceKind::ForwardingRule, "web-fr"),
    ]
    .into_iter()
    .map(|(kind, name)| (kind, name.to_string()))
    .collect()
}
