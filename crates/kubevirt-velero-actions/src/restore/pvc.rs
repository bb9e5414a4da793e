//! Claim restore action

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use kubevirt_velero_common::kube_utils::{annotation, ItemExt};
use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{ResourceKind, ANN_IN_PROGRESS, ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP};
use kubevirt_velero_graph::claim_restore_graph;

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::{collect_graph, narrow, ActionError};
use crate::identity::reverse_identity;

/// Skips half-imported claims, pulls in their DataVolume and undoes identity labeling.
#[derive(Debug, Default)]
pub struct PvcRestoreAction;

impl PvcRestoreAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RestoreItemAction for PvcRestoreAction {
    fn name(&self) -> &'static str {
        "restore-pvc-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::PersistentVolumeClaim])
    }

    async fn execute(
        &self,
        mut item: DynamicObject,
        _restore: &Restore,
        _cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        if annotation(&item.metadata, ANN_IN_PROGRESS).is_some() {
            info!(
                claim = %item.name_str(),
                namespace = %item.namespace_str(),
                "claim was captured mid-import, not restoring"
            );
            return Ok(RestoreOutcome::skip(item));
        }

        let pvc: PersistentVolumeClaim = narrow(&item)?;
        let extras = collect_graph(Vec::new(), claim_restore_graph(&pvc))?;

        if let Some(owners) = item.metadata.owner_references.as_mut() {
            owners.retain(|o| o.kind != ResourceKind::DataVolume.kind_str());
            if owners.is_empty() {
                item.metadata.owner_references = None;
            }
        }

        reverse_identity(&mut item.metadata, ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP);
        debug!(claim = %item.name_str(), extras = extras.len(), "restoring claim");
        Ok(RestoreOutcome::restore(item, extras))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use kubevirt_velero_common::{ResourceRef, LABEL_ORIGINAL_PVC_UID};

    use crate::action::{BackupItemAction, BackupOutcome};
    use crate::backup::PvcBackupAction;
    use crate::test_support::{annotation, backup, item, label, restore};

    async fn run(item: DynamicObject) -> RestoreOutcome {
        PvcRestoreAction::new()
            .execute(item, &restore(&[]), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn in_progress_claim_is_skipped() {
        let outcome = run(item(json!({
            "apiVersion": "v1", "kind": "PersistentVolumeClaim",
            "metadata": {
                "name": "disk", "namespace": "ns",
                "annotations": {"cdi.kubevirt.io/velero.inProgress": "true"}
            }
        })))
        .await;
        assert!(outcome.skip_restore);
    }

    #[tokio::test]
    async fn populated_claim_pulls_data_volume_and_drops_owner() {
        let outcome = run(item(json!({
            "apiVersion": "v1", "kind": "PersistentVolumeClaim",
            "metadata": {
                "name": "disk", "namespace": "ns",
                "annotations": {"cdi.kubevirt.io/storage.populatedFor": "disk"},
                "ownerReferences": [
                    {"apiVersion": "cdi.kubevirt.io/v1beta1", "kind": "DataVolume", "name": "disk", "uid": "dv-uid"},
                    {"apiVersion": "v1", "kind": "ConfigMap", "name": "keeper", "uid": "cm-uid"}
                ]
            }
        })))
        .await;
        assert!(!outcome.skip_restore);
        assert_eq!(
            outcome.extras,
            vec![ResourceRef::new(ResourceKind::DataVolume, "ns", "disk")]
        );
        let owners = outcome.item.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "ConfigMap");
    }

    // =========================================================================
    // Identity round trip through both actions
    // =========================================================================

    async fn round_trip(input: DynamicObject) -> DynamicObject {
        let backed_up = match PvcBackupAction::new()
            .execute(input, &backup(&[]), &CancellationToken::new())
            .await
            .unwrap()
        {
            BackupOutcome::Continue { item, .. } => item,
            BackupOutcome::Skip => panic!("claims are never skipped on backup"),
        };
        assert_eq!(label(&backed_up, LABEL_ORIGINAL_PVC_UID), Some("uid-1"));
        run(backed_up).await.item
    }

    #[tokio::test]
    async fn claim_without_identity_label_round_trips() {
        let input = item(json!({
            "apiVersion": "v1", "kind": "PersistentVolumeClaim",
            "metadata": {"name": "disk", "namespace": "ns", "uid": "uid-1", "labels": {"app": "db"}}
        }));
        let out = round_trip(input.clone()).await;
        assert_eq!(out.metadata.labels, input.metadata.labels);
        assert_eq!(out.metadata.annotations, None);
    }

    #[tokio::test]
    async fn claim_with_user_identity_label_round_trips() {
        let input = item(json!({
            "apiVersion": "v1", "kind": "PersistentVolumeClaim",
            "metadata": {
                "name": "disk", "namespace": "ns", "uid": "uid-1",
                "labels": {"velero.kubevirt.io/originalPVCUID": "mine"}
            }
        }));
        let out = round_trip(input).await;
        assert_eq!(label(&out, LABEL_ORIGINAL_PVC_UID), Some("mine"));
        assert_eq!(annotation(&out, ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP), None);
    }
}
