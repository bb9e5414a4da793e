//! VirtualMachine backup action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use kubevirt_velero_common::crd::VirtualMachine;
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{ResourceKind, ResourceRef};
use kubevirt_velero_graph::{dedup_refs, vm_can_be_safely_backed_up};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::{narrow, ActionError};

/// Vetoes unsafe backups of running VMs and pulls in their DataVolumes and instance.
#[derive(Debug, Default)]
pub struct VmBackupAction;

impl VmBackupAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

/// DataVolume templates, then the instance when one was created.
fn vm_extras(vm: &VirtualMachine) -> Vec<ResourceRef> {
    let mut extras: Vec<ResourceRef> = vm
        .spec
        .data_volume_templates
        .iter()
        .filter_map(|template| {
            let name = template.metadata.name.as_deref()?;
            let namespace = template
                .metadata
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(vm.namespace());
            Some(ResourceRef::new(ResourceKind::DataVolume, namespace, name))
        })
        .collect();
    if vm.is_created() {
        extras.push(ResourceRef::new(
            ResourceKind::VirtualMachineInstance,
            vm.namespace(),
            vm.name(),
        ));
    }
    dedup_refs(extras)
}

#[async_trait]
impl BackupItemAction for VmBackupAction {
    fn name(&self) -> &'static str {
        "backup-vm-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VirtualMachine])
    }

    #[instrument(skip_all, fields(backup = %backup.name()))]
    async fn execute(
        &self,
        item: DynamicObject,
        backup: &Backup,
        _cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let vm: VirtualMachine = narrow(&item)?;

        if !vm_can_be_safely_backed_up(&vm, backup) {
            return Err(ActionError::rejected(
                &item,
                "VM is running but its instance or launcher pod is not included in the backup",
            ));
        }

        let extras = vm_extras(&vm);
        info!(
            vm = %vm.name(),
            namespace = %vm.namespace(),
            extras = extras.len(),
            "backing up VirtualMachine"
        );
        Ok(BackupOutcome::with_extras(item, extras))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use serde_json::json;

    use crate::test_support::{backup, item};

    fn vm_item(created: bool, status: &str) -> DynamicObject {
        item(json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachine",
            "metadata": {"name": "test-vm", "namespace": "ns"},
            "spec": {
                "dataVolumeTemplates": [
                    {"metadata": {"name": "test-vm-dv"}, "spec": {"storage": {}}},
                    {"metadata": {"name": "shared-dv", "namespace": "images"}}
                ],
                "template": {"spec": {"volumes": [
                    {"name": "root", "dataVolume": {"name": "test-vm-dv"}}
                ]}}
            },
            "status": {"created": created, "printableStatus": status}
        }))
    }

    async fn run(item: DynamicObject, included: &[&str]) -> Result<BackupOutcome, ActionError> {
        VmBackupAction::new()
            .execute(item, &backup(included), &CancellationToken::new())
            .await
    }

    fn extras_of(outcome: BackupOutcome) -> Vec<ResourceRef> {
        match outcome {
            BackupOutcome::Continue { extras, .. } => extras,
            BackupOutcome::Skip => panic!("VM backup never skips"),
        }
    }

    #[tokio::test]
    async fn stopped_vm_backs_up_its_data_volumes() {
        let extras = extras_of(run(vm_item(false, "Stopped"), &[]).await.unwrap());
        assert_eq!(
            extras,
            vec![
                ResourceRef::new(ResourceKind::DataVolume, "ns", "test-vm-dv"),
                ResourceRef::new(ResourceKind::DataVolume, "images", "shared-dv"),
            ]
        );
        assert_eq!(extras[0].group, "cdi.kubevirt.io");
    }

    #[tokio::test]
    async fn running_vm_without_instances_in_backup_is_rejected() {
        let err = run(vm_item(true, "Running"), &["pods"]).await.unwrap_err();
        assert!(matches!(err, ActionError::Rejected { .. }));
        assert!(err.to_string().contains("cannot safely back up"));

        let err = run(vm_item(true, "Starting"), &["virtualmachineinstances"])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Rejected { .. }));
    }

    #[tokio::test]
    async fn inactive_vm_ignores_include_list() {
        for status in ["Stopped", "Paused", "Stopping", "Terminating", "Migrating", "Provisioning"] {
            assert!(run(vm_item(false, status), &["pods"]).await.is_ok(), "{}", status);
        }
    }

    #[tokio::test]
    async fn running_vm_with_pods_and_instances_succeeds() {
        let outcome = run(vm_item(true, "Running"), &["pods", "virtualmachineinstances"])
            .await
            .unwrap();
        let extras = extras_of(outcome);
        assert!(extras.contains(&ResourceRef::new(ResourceKind::DataVolume, "ns", "test-vm-dv")));
        assert_eq!(
            extras.last(),
            Some(&ResourceRef::new(
                ResourceKind::VirtualMachineInstance,
                "ns",
                "test-vm"
            ))
        );
    }

    #[tokio::test]
    async fn repeated_backup_is_stable() {
        let first = run(vm_item(true, "Running"), &[]).await.unwrap();
        let second = run(vm_item(true, "Running"), &[]).await.unwrap();
        match (first, second) {
            (
                BackupOutcome::Continue { item: a, extras: ea },
                BackupOutcome::Continue { item: b, extras: eb },
            ) => {
                assert_eq!(a.metadata.annotations, b.metadata.annotations);
                let ea: HashSet<_> = ea.into_iter().collect();
                let eb: HashSet<_> = eb.into_iter().collect();
                assert_eq!(ea, eb);
            }
            _ => panic!("VM backup never skips"),
        }
    }

    #[tokio::test]
    async fn malformed_item_is_reported() {
        let bad = item(json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachine",
            "metadata": {"name": "vm", "namespace": "ns"},
            "spec": {"dataVolumeTemplates": "not-a-list"}
        }));
        let err = run(bad, &[]).await.unwrap_err();
        assert!(matches!(err, ActionError::Malformed { .. }));
    }
}
