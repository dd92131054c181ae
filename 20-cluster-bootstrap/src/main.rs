use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cluster_bootstrap::{
    cli::Cli,
    config::NodeConfig,
    node::{Node, open_registry},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = NodeConfig::from(Cli::parse());
    let registry = open_registry(&config).context("failed to open peer registry")?;

    let node = Node::bind(config, registry).await?;
    info!("node listening on {}", node.identity());

    node.bootstrap().await?;
    node.serve_until_ctrl_c().await;

    Ok(())
}
