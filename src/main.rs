//! kubevirt-velero-plugin - Velero item actions for KubeVirt workloads

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing::info;

use kubevirt_velero_actions::PluginRegistry;
use kubevirt_velero_common::telemetry::{init_logging, LoggingConfig};
use kubevirt_velero_graph::KubeLookup;
use kubevirt_velero_plugin::server::{hook_routes, serve, AppState};
use kubevirt_velero_plugin::{Command, Config};

/// API server address for a client that is never used to make requests
const DETACHED_CLUSTER_URL: &str = "https://127.0.0.1:6443";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    match config.command() {
        Command::Manifest => print_manifest().await,
        Command::Serve => run_server(config).await,
    }
}

/// Print the registration manifest without contacting the cluster.
async fn print_manifest() -> anyhow::Result<()> {
    let client = Client::try_from(kube::Config::new(DETACHED_CLUSTER_URL.parse()?))?;
    let registry = PluginRegistry::with_default_actions(Arc::new(KubeLookup::new(client)));
    print!("{}", serde_yaml::to_string(&registry.manifest())?);
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    init_logging(LoggingConfig {
        json: config.log_json,
        with_target: false,
    })?;

    let client = Client::try_default().await?;
    let registry = PluginRegistry::with_default_actions(Arc::new(KubeLookup::new(client)));
    info!(
        actions = registry.manifest().len(),
        hook_timeout_secs = config.hook_timeout_secs,
        "registered item actions"
    );

    let router = hook_routes(AppState {
        registry: Arc::new(registry),
        hook_timeout: config.hook_timeout(),
    });
    serve(config.listen_addr, router).await?;
    Ok(())
}
