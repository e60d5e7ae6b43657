use envconfig::Envconfig;
use tracing_subscriber::EnvFilter;

use gclb::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::init_from_env()?;
    tracing::info!(?config, "starting gclb");
    gclb::server::serve(config).await
}
