//! kubevirt-velero CLI library
//!
//! Thin front-end that creates Velero requests for KubeVirt workloads and
//! optionally waits for them to finish.

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use kubevirt_velero_common::velero::VELERO_NAMESPACE;

/// Back up and restore KubeVirt workloads with Velero
#[derive(Parser, Debug)]
#[command(name = "kubevirt-velero")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Namespace Velero runs in
    #[arg(long, short = 'n', global = true, default_value = VELERO_NAMESPACE)]
    pub namespace: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a Velero Backup
    Backup(commands::backup::BackupArgs),
    /// Create a Velero Restore from an existing backup
    Restore(commands::restore::RestoreArgs),
    /// Ask Velero to delete a backup and its data
    DeleteBackup(commands::delete_backup::DeleteBackupArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Backup(args) => commands::backup::run(&self.namespace, args).await,
            Commands::Restore(args) => commands::restore::run(&self.namespace, args).await,
            Commands::DeleteBackup(args) => {
                commands::delete_backup::run(&self.namespace, args).await
            }
        }
    }
}
