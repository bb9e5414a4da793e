//! `kubevirt-velero delete-backup` - ask Velero to delete a backup.

use clap::Args;

use kubevirt_velero_common::velero::DeleteBackupRequest;

use super::{create_request, kube_client};
use crate::Result;

/// Delete a Velero backup
#[derive(Args, Debug)]
pub struct DeleteBackupArgs {
    /// Name of the backup to delete
    pub name: String,
}

/// DeleteBackupRequest for `backup_name`, named after it and the current time
pub fn build_request(namespace: &str, backup_name: &str) -> DeleteBackupRequest {
    let name = format!(
        "{}-delete-{}",
        backup_name,
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    );
    DeleteBackupRequest::new(name, namespace, backup_name)
}

/// Run the delete-backup command.
pub async fn run(namespace: &str, args: DeleteBackupArgs) -> Result<()> {
    let request = build_request(namespace, &args.name);
    let request_name = request.metadata.name.clone().unwrap_or_default();
    let client = kube_client().await?;

    create_request(client, namespace, &request_name, &request).await?;
    println!("Deletion of backup '{}' requested.", args.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_targets_backup() {
        let request = build_request("velero", "vm-backup");
        assert_eq!(request.spec.backup_name, "vm-backup");
        assert_eq!(request.metadata.namespace.as_deref(), Some("velero"));
        assert!(request
            .metadata
            .name
            .as_deref()
            .unwrap()
            .starts_with("vm-backup-delete-"));
    }
}
