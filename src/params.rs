use serde::Deserialize;
use serde_json::{Map, Value};

use crate::clients::rest::AccessToken;
use crate::resource::{Project, Region, ResourceName, Zone};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("missing required parameter {0:?}")]
    Missing(&'static str),

    #[error("parameter {name:?} is invalid: {message}")]
    Invalid { name: &'static str, message: String },

    #[error("{0}")]
    Conflict(&'static str),
}

/// Body of an action invocation as sent by the automation platform.
///
/// `params` are the action's own parameters, `settings` the plugin-wide
/// settings; `query` is only used by autocomplete listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub query: Option<String>,
}

/// Resolve a plain string or an autocomplete selection `{"id", "value"}`.
/// Selections resolve to their `id`; empty strings count as absent.
fn autocomplete(name: &'static str, value: &Value) -> Result<Option<String>, ParamError> {
    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let resolved = match value {
        Value::Null => None,
        Value::Object(fields) => Some(fields.get("id").and_then(scalar).ok_or_else(|| {
            ParamError::Invalid {
                name,
                message: "not a valid autocomplete result".into(),
            }
        })?),
        other => Some(scalar(other).ok_or_else(|| ParamError::Invalid {
            name,
            message: format!("expected a string, got {other}"),
        })?),
    };
    Ok(resolved.filter(|s| !s.is_empty()))
}

impl ActionRequest {
    pub fn new(params: Value) -> Self {
        Self {
            params: match params {
                Value::Object(fields) => fields,
                _ => Map::new(),
            },
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        if let Value::Object(fields) = settings {
            self.settings = fields;
        }
        self
    }

    pub fn optional(&self, name: &'static str) -> Result<Option<String>, ParamError> {
        match self.params.get(name) {
            Some(value) => autocomplete(name, value),
            None => Ok(None),
        }
    }

    pub fn required(&self, name: &'static str) -> Result<String, ParamError> {
        self.optional(name)?.ok_or(ParamError::Missing(name))
    }

    pub fn name(&self, name: &'static str) -> Result<ResourceName, ParamError> {
        self.required(name).map(ResourceName)
    }

    pub fn optional_name(&self, name: &'static str) -> Result<Option<ResourceName>, ParamError> {
        Ok(self.optional(name)?.map(ResourceName))
    }

    /// Project from the action params, then plugin settings, then `fallback`.
    pub fn project(&self, fallback: Option<&str>) -> Result<Project, ParamError> {
        if let Some(project) = self.optional("project")? {
            return Ok(Project(project));
        }
        if let Some(value) = self.settings.get("project")
            && let Some(project) = autocomplete("project", value)?
        {
            return Ok(Project(project));
        }
        fallback
            .filter(|p| !p.is_empty())
            .map(|p| Project(p.to_string()))
            .ok_or(ParamError::Missing("project"))
    }

    pub fn zone(&self) -> Result<Zone, ParamError> {
        self.required("zone").map(Zone)
    }

    pub fn region(&self) -> Result<Option<Region>, ParamError> {
        Ok(self.optional("region")?.map(Region))
    }

    /// Access token from the action params, then plugin settings, then
    /// `fallback`. Accepts a bare token or an object carrying
    /// `access_token`/`token` (also as a JSON string). Null and blank values
    /// count as absent.
    pub fn credentials(&self, fallback: Option<&str>) -> Result<AccessToken, ParamError> {
        let given = [&self.params, &self.settings].into_iter().find_map(|fields| {
            fields.get("credentials").filter(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
        });
        match given {
            Some(value) => access_token(value).map(AccessToken::new),
            None => fallback
                .filter(|t| !t.is_empty())
                .map(AccessToken::new)
                .ok_or(ParamError::Missing("credentials")),
        }
    }

    /// A provider-shaped JSON payload, given as an object or a JSON string.
    pub fn json_object(&self, name: &'static str) -> Result<Value, ParamError> {
        let value = match self.params.get(name) {
            None | Some(Value::Null) => return Err(ParamError::Missing(name)),
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).map_err(|e| ParamError::Invalid {
                    name,
                    message: e.to_string(),
                })?
            }
            Some(value) => value.clone(),
        };
        if !value.is_object() {
            return Err(ParamError::Invalid {
                name,
                message: "expected a JSON object".into(),
            });
        }
        Ok(value)
    }
}

fn access_token(value: &Value) -> Result<String, ParamError> {
    let invalid = |message: &str| ParamError::Invalid {
        name: "credentials",
        message: message.into(),
    };
    match value {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => access_token(&parsed),
            _ if raw.trim().is_empty() => Err(ParamError::Missing("credentials")),
            _ => Ok(raw.trim().to_string()),
        },
        Value::Object(fields) => fields
            .get("access_token")
            .or_else(|| fields.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| invalid("expected an access_token or token field")),
        _ => Err(invalid("expected a token string or object")),
    }
}

/// Names and settings for one orchestrated load-balancer creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerParams {
    pub health_check_name: ResourceName,
    /// Health check protocol (`HTTP`, `HTTPS`, `TCP`, ...).
    pub health_check_type: String,
    pub backend_service_name: ResourceName,
    pub instance_group_name: ResourceName,
    pub url_map_name: ResourceName,
    pub http_proxy_name: Option<ResourceName>,
    pub https_proxy_name: Option<ResourceName>,
    pub ssl_certificate_name: Option<ResourceName>,
    pub forwarding_rule_name: ResourceName,
    pub port_range: String,
}

impl LoadBalancerParams {
    pub fn from_request(request: &ActionRequest) -> Result<Self, ParamError> {
        Ok(Self {
            health_check_name: request.name("healthCheckName")?,
            health_check_type: request
                .optional("type")?
                .unwrap_or_else(|| "HTTP".into())
                .to_ascii_uppercase(),
            backend_service_name: request.name("backendServiceName")?,
            instance_group_name: request.name("instanceGroupName")?,
            url_map_name: request.name("urlMapName")?,
            http_proxy_name: request.optional_name("httpProxyName")?,
            https_proxy_name: request.optional_name("httpsProxyName")?,
            ssl_certificate_name: request.optional_name("sslCertificateName")?,
            forwarding_rule_name: request.name("forwardingRuleName")?,
            port_range: request.required("forwardRulePortRange")?,
        })
    }
}
