mod common;

use fail::FailScenario;

use gclb::clients::fake::CreateBehavior;
use gclb::loadbalancer::Flavor;
use gclb::orchestrator::{self, ProvisioningError, StepError};
use gclb::resource::ResourceKind;

use common::{client, context, http_params, reference, seeded_fake};

#[tokio::test]
async fn operation_lost_after_create_is_not_rolled_back() {
    let scenario = FailScenario::setup();
    // Health check goes through; the backend service create is accepted but
    // its operation is never confirmed.
    fail::cfg("provision-after-create", "1*off->return").unwrap();

    let fake = seeded_fake();
    let err = orchestrator::run(&client(&fake), Flavor::Http.steps(), &context(http_params()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisioningError::StepFailed {
            step: 2,
            source: StepError::Operation(_),
            ..
        }
    ));
    assert_eq!(
        fake.deletes(),
        vec![(ResourceKind::HealthCheck, "web-hc".to_string())]
    );
    // Unconfirmed, so unrecorded: the backend service stays behind.
    assert!(fake.contains(&reference(ResourceKind::BackendService, "web-bs")));

    fail::remove("provision-after-create");
    scenario.teardown();
}

#[tokio::test]
async fn injected_rollback_failure_is_reported_as_orphan() {
    let scenario = FailScenario::setup();
    fail::cfg("rollback-before-delete", "1*return->off").unwrap();

    let fake = seeded_fake().on_create(
        ResourceKind::ForwardingRule,
        CreateBehavior::Reject("quota exceeded".into()),
    );
    let err = orchestrator::run(&client(&fake), Flavor::Http.steps(), &context(http_params()))
        .await
        .unwrap_err();

    let report = err.rollback().unwrap();
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].resource.kind, ResourceKind::TargetHttpProxy);
    assert_eq!(report.deleted.len(), 3);
    // The proxy's delete never reached the API; the rest still did.
    assert_eq!(
        fake.deletes(),
        vec![
            (ResourceKind::UrlMap, "web-map".to_string()),
            (ResourceKind::BackendService, "web-bs".to_string()),
            (ResourceKind::HealthCheck, "web-hc".to_string()),
        ]
    );

    fail::remove("rollback-before-delete");
    scenario.teardown();
}
