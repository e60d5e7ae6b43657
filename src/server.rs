use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::actions::{self, Action, ActionError};
use crate::clients::client::{ClientError, ResourceClient};
use crate::clients::rest::RestClient;
use crate::config::Config;
use crate::orchestrator::{ProvisioningError, StepError};
use crate::params::{ActionRequest, ParamError};

/// Where each action gets its Compute client from.
#[derive(Debug, Clone)]
pub enum ClientSource {
    /// A REST client per request, authorized with the caller's token.
    Rest {
        http: reqwest::Client,
        endpoint: String,
        projects_endpoint: String,
        default_token: Option<String>,
    },
    /// The same client for every request.
    Fixed(ResourceClient),
}

impl ClientSource {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::Rest {
            http,
            endpoint: config.compute_endpoint.clone(),
            projects_endpoint: config.resource_manager_endpoint.clone(),
            default_token: config.access_token.clone(),
        })
    }

    fn client_for(&self, request: &ActionRequest) -> Result<ResourceClient, ParamError> {
        match self {
            Self::Rest {
                http,
                endpoint,
                projects_endpoint,
                default_token,
            } => {
                let token = request.credentials(default_token.as_deref())?;
                Ok(ResourceClient::Rest(
                    RestClient::new(http.clone(), endpoint.clone(), token)
                        .with_projects_endpoint(projects_endpoint.clone()),
                ))
            }
            Self::Fixed(client) => Ok(client.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    clients: ClientSource,
    default_project: Option<String>,
}

impl AppState {
    pub fn new(clients: ClientSource, default_project: Option<String>) -> Self {
        Self {
            clients,
            default_project,
        }
    }
}

fn client_status(e: &ClientError) -> StatusCode {
    match e {
        ClientError::NotFound { .. } => StatusCode::NOT_FOUND,
        ClientError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ClientError::Api { status, .. } if (400..500).contains(status) => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownAction(_) => StatusCode::NOT_FOUND,
            Self::Params(_) | Self::Unnamed(_) => StatusCode::BAD_REQUEST,
            Self::Client(e) => client_status(e),
            // Nothing was created and the payload itself was at fault.
            Self::Provisioning(ProvisioningError::StepFailed {
                source: StepError::Build(_),
                rollback: None,
                ..
            }) => StatusCode::BAD_REQUEST,
            Self::Operation(_) | Self::Provisioning(_) => StatusCode::BAD_GATEWAY,
            Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({ "error": self.to_string() });
        if let Self::Provisioning(e) = &self {
            body["failedKind"] = json!(e.failed_kind());
            if let Some(report) = e.rollback() {
                body["rollback"] = json!(report);
            }
        }
        if status.is_server_error() {
            error!(error = %self, "action failed");
        } else {
            warn!(error = %self, "action rejected");
        }
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn run_action(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<Value>, ActionError> {
    let action = Action::from_method(&method)?;
    let client = state.clients.client_for(&request)?;
    info!(%method, "running action");
    let output =
        actions::dispatch(&client, action, &request, state.default_project.as_deref()).await?;
    Ok(Json(output))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/actions/{method}", post(run_action))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(ClientSource::from_config(&config)?, config.project.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, endpoint = %config.compute_endpoint, "listening for actions");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use http::Request;
    use tower::ServiceExt;

    use crate::clients::fake::FakeClient;

    fn app(fake: FakeClient) -> Router {
        router(AppState::new(
            ClientSource::Fixed(ResourceClient::Fake(fake)),
            Some("acme".into()),
        ))
    }

    async fn post_action(app: Router, method: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(format!("/actions/{method}"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = app(FakeClient::new())
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_action_is_404() {
        let (status, body) = post_action(app(FakeClient::new()), "launchRockets", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("launchRockets"));
    }

    #[tokio::test]
    async fn missing_parameter_is_400() {
        let (status, _) = post_action(
            app(FakeClient::new()),
            "deleteHealthCheck",
            json!({ "params": {} }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_health_check_type_is_400() {
        let fake = FakeClient::new();
        let (status, body) = post_action(
            app(fake.clone()),
            "createHttpExternalLoadBalancer",
            json!({ "params": {
                "zone": "us-central1-a",
                "type": "carrier-pigeon",
                "healthCheckName": "web-hc",
                "backendServiceName": "web-bs",
                "instanceGroupName": "web-ig",
                "urlMapName": "web-map",
                "httpProxyName": "web-proxy",
                "forwardingRuleName": "web-fr",
                "forwardRulePortRange": "80",
            } }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["failedKind"], "healthCheck");
        assert!(body.get("rollback").is_none());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_resource_is_404() {
        let (status, _) = post_action(
            app(FakeClient::new()),
            "deleteUrlMap",
            json!({ "params": { "urlMapName": "gone" } }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rest_source_requires_credentials() {
        let source = ClientSource::Rest {
            http: reqwest::Client::new(),
            endpoint: "http://127.0.0.1:9".into(),
            projects_endpoint: "http://127.0.0.1:9".into(),
            default_token: None,
        };
        let (status, body) = post_action(
            router(AppState::new(source, None)),
            "listRegionsAuto",
            json!({ "params": { "project": "acme" } }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("credentials"));
    }
}
