mod common;

use axum::body::{Body, to_bytes};
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use gclb::actions::{Action, ActionError, dispatch};
use gclb::clients::client::ResourceClient;
use gclb::clients::fake::{Call, FakeClient};
use gclb::params::{ActionRequest, ParamError};
use gclb::resource::ResourceKind;
use gclb::server::{AppState, ClientSource, router};

use common::{PROJECT, client, load_balancer_params, reference, seeded_fake};

#[tokio::test]
async fn deleting_a_backend_service_does_not_cascade() {
    let fake = seeded_fake()
        .with_resource(reference(ResourceKind::HealthCheck, "web-hc"))
        .with_resource(reference(ResourceKind::BackendService, "web-bs"))
        .with_resource(reference(ResourceKind::UrlMap, "web-map"));
    let request = ActionRequest::new(json!({
        "project": PROJECT,
        "backendServiceName": { "id": "web-bs", "value": "web-bs" },
    }));

    let output = dispatch(
        &client(&fake),
        Action::Delete(ResourceKind::BackendService),
        &request,
        None,
    )
    .await
    .unwrap();

    assert_eq!(output, Value::Null);
    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        Call::Delete {
            kind: ResourceKind::BackendService,
            name: "web-bs".into()
        }
    );
    assert!(matches!(calls[1], Call::Wait { .. }));
    assert!(fake.contains(&reference(ResourceKind::UrlMap, "web-map")));
    assert!(fake.contains(&reference(ResourceKind::HealthCheck, "web-hc")));
}

#[tokio::test]
async fn http_action_creates_http_proxy() {
    let fake = seeded_fake();
    let output = dispatch(
        &client(&fake),
        Action::from_method("createHttpExternalLoadBalancer").unwrap(),
        &ActionRequest::new(load_balancer_params(false)),
        None,
    )
    .await
    .unwrap();

    assert!(output.get("compute#targetHttpProxy").is_some());
    assert!(output.get("compute#targetHttpsProxy").is_none());
    assert_eq!(output.as_object().unwrap().len(), 5);
}

#[tokio::test]
async fn https_action_creates_https_proxy() {
    let fake = seeded_fake();
    let output = dispatch(
        &client(&fake),
        Action::from_method("createHttpsExternalLoadBalancer").unwrap(),
        &ActionRequest::new(load_balancer_params(true)),
        None,
    )
    .await
    .unwrap();

    assert!(output.get("compute#targetHttpsProxy").is_some());
    assert_eq!(output["compute#forwardingRule"]["portRange"], "443");
}

#[tokio::test]
async fn conflicting_proxy_names_are_rejected_before_any_call() {
    let fake = seeded_fake();
    let mut params = load_balancer_params(true);
    params["httpProxyName"] = json!("web-http-proxy");

    let err = dispatch(
        &client(&fake),
        Action::CreateHttpsExternalLoadBalancer,
        &ActionRequest::new(params),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ActionError::Params(ParamError::Conflict(_))));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn failed_provisioning_reports_rollback_over_http() {
    // No certificate: the HTTPS proxy step cannot build.
    let fake = FakeClient::new().with_resource(reference(ResourceKind::InstanceGroup, "web-ig"));
    let app = router(AppState::new(
        ClientSource::Fixed(ResourceClient::Fake(fake.clone())),
        None,
    ));

    let response = app
        .oneshot(
            Request::post("/actions/createHttpsExternalLoadBalancer")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "params": load_balancer_params(true) }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["failedKind"], "targetHttpsProxy");
    let deleted: Vec<_> = body["rollback"]["deleted"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(deleted, vec!["urlMap", "backendService", "healthCheck"]);
    assert_eq!(body["rollback"]["orphaned"], json!([]));
}

#[tokio::test]
async fn project_comes_from_settings_when_params_omit_it() {
    let fake = seeded_fake();
    let mut params = load_balancer_params(false);
    params.as_object_mut().unwrap().remove("project");
    let request = ActionRequest::new(params).with_settings(json!({ "project": PROJECT }));

    dispatch(
        &client(&fake),
        Action::CreateHttpExternalLoadBalancer,
        &request,
        Some("somewhere-else"),
    )
    .await
    .unwrap();
    assert_eq!(fake.creates().len(), 5);
}
