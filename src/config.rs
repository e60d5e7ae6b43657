use std::net::SocketAddr;
use std::time::Duration;

use envconfig::Envconfig;

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Envconfig)]
pub struct Config {
    #[envconfig(from = "GCLB_LISTEN_ADDR", default = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    #[envconfig(from = "GCLB_COMPUTE_ENDPOINT", default = "https://compute.googleapis.com")]
    pub compute_endpoint: String,

    /// Serves `listProjectsAuto`.
    #[envconfig(
        from = "GCLB_RESOURCE_MANAGER_ENDPOINT",
        default = "https://cloudresourcemanager.googleapis.com"
    )]
    pub resource_manager_endpoint: String,

    /// Used when an action names no project in its params or settings.
    #[envconfig(from = "GCLB_PROJECT")]
    pub project: Option<String>,

    /// Used when an action carries no credentials.
    #[envconfig(from = "GCLB_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// Per-request HTTP timeout. Must outlast the provider's operation
    /// long-poll (about two minutes).
    #[envconfig(from = "GCLB_REQUEST_TIMEOUT_SECS", default = "150")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("compute_endpoint", &self.compute_endpoint)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("project", &self.project)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
