//! VirtualMachineInstance backup action

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use kubevirt_velero_common::crd::VirtualMachineInstance;
use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{ResourceKind, ANN_IS_OWNED};
use kubevirt_velero_graph::{
    assess_instance, ClusterLookup, GraphBuilder, GraphRoot, InstanceVerdict, ScopedLookup,
};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::{collect_graph, narrow, ActionError};

/// Checks that an instance can be restored from this backup, marks owned
/// instances, and pulls in the instance's object graph.
pub struct VmiBackupAction {
    lookup: Arc<dyn ClusterLookup>,
}

impl VmiBackupAction {
    /// Create the action over a cluster lookup
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl BackupItemAction for VmiBackupAction {
    fn name(&self) -> &'static str {
        "backup-vmi-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VirtualMachineInstance])
    }

    #[instrument(skip_all, fields(backup = %backup.name()))]
    async fn execute(
        &self,
        mut item: DynamicObject,
        backup: &Backup,
        cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let vmi: VirtualMachineInstance = narrow(&item)?;
        let lookup = ScopedLookup::new(self.lookup.as_ref(), cancel);

        let verdict = assess_instance(&vmi, backup, lookup)
            .await
            .map_err(|e| ActionError::from_safety(&item, e))?;
        match verdict {
            InstanceVerdict::Exclude => {
                debug!(instance = %vmi.name(), namespace = %vmi.namespace(), "skipping instance");
                return Ok(BackupOutcome::Skip);
            }
            InstanceVerdict::Owned => {
                item.annotations_mut()
                    .insert(ANN_IS_OWNED.to_string(), "true".to_string());
            }
            InstanceVerdict::Standalone => {}
        }

        let graph = GraphBuilder::new(lookup)
            .backup_graph(GraphRoot::Instance(&vmi))
            .await;
        let extras = collect_graph(Vec::new(), graph)?;

        info!(
            instance = %vmi.name(),
            namespace = %vmi.namespace(),
            verdict = ?verdict,
            extras = extras.len(),
            "backing up VirtualMachineInstance"
        );
        Ok(BackupOutcome::with_extras(item, extras))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    use kubevirt_velero_common::velero::BackupSpec;
    use kubevirt_velero_common::{ResourceRef, LABEL_METADATA_BACKUP};

    use crate::test_support::{annotation, backup, item, MockLookup};

    fn vmi_item(owned: bool) -> DynamicObject {
        let mut value = json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachineInstance",
            "metadata": {"name": "vm", "namespace": "ns"},
            "spec": {"volumes": [
                {"name": "root", "dataVolume": {"name": "root-dv"}},
                {"name": "ci", "cloudInitNoCloud": {"userData": "#cloud-config"}}
            ]}
        });
        if owned {
            value["metadata"]["ownerReferences"] = json!([{
                "apiVersion": "kubevirt.io/v1", "kind": "VirtualMachine",
                "name": "vm", "uid": "vm-uid", "controller": true
            }]);
        }
        item(value)
    }

    fn launcher() -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("virt-launcher-vm-abcde".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn owner_vm_lookup(mock: &mut MockLookup, excluded: bool) {
        mock.expect_get_virtual_machine().returning(move |namespace, name| {
            let labels = if excluded {
                json!({"velero.io/exclude-from-backup": "true"})
            } else {
                json!({})
            };
            Ok(serde_json::from_value(json!({
                "metadata": {"name": name, "namespace": namespace, "labels": labels}
            }))
            .unwrap())
        });
    }

    #[tokio::test]
    async fn owned_instance_without_vms_in_backup_is_skipped() {
        let action = VmiBackupAction::new(Arc::new(MockLookup::new()));
        let outcome = action
            .execute(
                vmi_item(true),
                &backup(&["virtualmachineinstances", "pods"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.is_skip());
    }

    #[tokio::test]
    async fn owned_instance_with_excluded_owner_is_skipped() {
        let mut mock = MockLookup::new();
        owner_vm_lookup(&mut mock, true);
        let action = VmiBackupAction::new(Arc::new(mock));

        let outcome = action
            .execute(vmi_item(true), &backup(&[]), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_skip());
    }

    #[tokio::test]
    async fn owned_instance_is_annotated_and_expanded() {
        let mut mock = MockLookup::new();
        owner_vm_lookup(&mut mock, false);
        mock.expect_get_runner_pod()
            .returning(|_, _| Ok(Some(launcher())));
        let action = VmiBackupAction::new(Arc::new(mock));

        let outcome = action
            .execute(vmi_item(true), &backup(&[]), &CancellationToken::new())
            .await
            .unwrap();
        match outcome {
            BackupOutcome::Continue { item, extras } => {
                assert_eq!(annotation(&item, ANN_IS_OWNED), Some("true"));
                assert_eq!(
                    extras,
                    vec![
                        ResourceRef::new(ResourceKind::Pod, "ns", "virt-launcher-vm-abcde"),
                        ResourceRef::new(ResourceKind::DataVolume, "ns", "root-dv"),
                        ResourceRef::new(ResourceKind::PersistentVolumeClaim, "ns", "root-dv"),
                    ]
                );
            }
            BackupOutcome::Skip => panic!("owned instance with VM in backup is kept"),
        }
    }

    #[tokio::test]
    async fn owned_instance_in_metadata_backup_skips_volume_check() {
        let mut mock = MockLookup::new();
        owner_vm_lookup(&mut mock, false);
        mock.expect_get_runner_pod()
            .returning(|_, _| Ok(Some(launcher())));
        let action = VmiBackupAction::new(Arc::new(mock));

        let mut request = Backup::new(
            "meta",
            "velero",
            BackupSpec {
                included_resources: vec![
                    "virtualmachines".to_string(),
                    "virtualmachineinstances".to_string(),
                    "pods".to_string(),
                ],
                ..Default::default()
            },
        );
        request.metadata.labels = Some(
            [(LABEL_METADATA_BACKUP.to_string(), "true".to_string())]
                .into_iter()
                .collect(),
        );

        let outcome = action
            .execute(vmi_item(true), &request, &CancellationToken::new())
            .await
            .unwrap();
        match outcome {
            BackupOutcome::Continue { item, extras } => {
                assert_eq!(annotation(&item, ANN_IS_OWNED), Some("true"));
                assert!(extras.contains(&ResourceRef::new(ResourceKind::DataVolume, "ns", "root-dv")));
            }
            BackupOutcome::Skip => panic!("instance must be kept"),
        }
    }

    #[tokio::test]
    async fn standalone_instance_missing_volumes_is_rejected() {
        let mut mock = MockLookup::new();
        mock.expect_get_runner_pod()
            .returning(|_, _| Ok(Some(launcher())));
        let action = VmiBackupAction::new(Arc::new(mock));

        let err = action
            .execute(
                vmi_item(false),
                &backup(&["virtualmachineinstances", "pods"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("VM has volumes not included in the backup"));
    }

    #[tokio::test]
    async fn cancelled_hook_reports_cancellation() {
        let action = VmiBackupAction::new(Arc::new(MockLookup::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = action
            .execute(vmi_item(false), &backup(&[]), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
