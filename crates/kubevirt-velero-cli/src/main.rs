//! kubevirt-velero CLI
//!
//! Scripted backup/restore of KubeVirt workloads through Velero.

use clap::Parser;

use kubevirt_velero_cli::{Cli, Result};
use kubevirt_velero_common::telemetry::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default())?;

    let cli = Cli::parse();
    cli.run().await
}
