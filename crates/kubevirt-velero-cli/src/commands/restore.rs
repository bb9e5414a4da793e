//! `kubevirt-velero restore` - create a Velero Restore from a backup.

use clap::Args;

use kubevirt_velero_common::velero::{Restore, RestoreSpec};

use super::{create_request, kube_client, verify_succeeded, FilterArgs, VerifyArgs};
use crate::{Error, Result};

/// Create a Velero Restore
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Name of the restore
    pub name: String,

    /// Backup to restore from
    #[arg(long)]
    pub from_backup: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub verify: VerifyArgs,
}

/// Velero Restore requested by `args`
pub fn build_restore(namespace: &str, args: &RestoreArgs) -> Result<Restore> {
    if args.from_backup.is_empty() {
        return Err(Error::validation("--from-backup must name a backup"));
    }
    let spec = RestoreSpec {
        backup_name: args.from_backup.clone(),
        included_namespaces: args.filter.include_namespaces.clone(),
        included_resources: args.filter.include_resources.clone(),
        label_selector: args.filter.label_selector()?,
        ..Default::default()
    };
    Ok(Restore::new(&args.name, namespace, spec))
}

/// Run the restore command.
pub async fn run(namespace: &str, args: RestoreArgs) -> Result<()> {
    let restore = build_restore(namespace, &args)?;
    let client = kube_client().await?;

    create_request(client.clone(), namespace, &args.name, &restore).await?;
    println!(
        "Restore '{}' from backup '{}' created.",
        args.name, args.from_backup
    );

    if args.verify.verify_succeeded {
        verify_succeeded::<Restore>(client, namespace, &args.name, &args.verify).await?;
        println!("Restore '{}' completed.", args.name);
    }
    Ok(())
}
