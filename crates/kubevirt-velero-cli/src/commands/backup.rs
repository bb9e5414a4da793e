//! `kubevirt-velero backup` - create a Velero Backup.

use clap::Args;

use kubevirt_velero_common::velero::{Backup, BackupSpec};

use super::{create_request, kube_client, verify_succeeded, FilterArgs, VerifyArgs};
use crate::Result;

/// Create a Velero Backup
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Name of the backup
    pub name: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Volume snapshot location to use
    #[arg(long)]
    pub volume_snapshot_location: Option<String>,

    #[command(flatten)]
    pub verify: VerifyArgs,
}

/// Velero Backup requested by `args`
pub fn build_backup(namespace: &str, args: &BackupArgs) -> Result<Backup> {
    let spec = BackupSpec {
        included_namespaces: args.filter.include_namespaces.clone(),
        included_resources: args.filter.include_resources.clone(),
        label_selector: args.filter.label_selector()?,
        volume_snapshot_locations: args.volume_snapshot_location.iter().cloned().collect(),
        ..Default::default()
    };
    Ok(Backup::new(&args.name, namespace, spec))
}

/// Run the backup command.
pub async fn run(namespace: &str, args: BackupArgs) -> Result<()> {
    let backup = build_backup(namespace, &args)?;
    let client = kube_client().await?;

    create_request(client.clone(), namespace, &args.name, &backup).await?;
    println!("Backup '{}' created.", args.name);

    if args.verify.verify_succeeded {
        verify_succeeded::<Backup>(client, namespace, &args.name, &args.verify).await?;
        println!("Backup '{}' completed.", args.name);
    }
    Ok(())
}
