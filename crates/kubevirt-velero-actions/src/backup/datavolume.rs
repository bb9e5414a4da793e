//! DataVolume / claim population backup action
//!
//! Records how a claim relates to the DataVolume that populates it, so the
//! restore side can tell populated claims from half-imported ones.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use kubevirt_velero_common::crd::DataVolume;
use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{
    ResourceKind, ResourceRef, ANN_IN_PROGRESS, ANN_POPULATED_FOR, ANN_PRE_POPULATED,
};
use kubevirt_velero_graph::{ClusterLookup, ScopedLookup};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::{narrow, ActionError};

/// Annotates claims with their DataVolume and DataVolumes with their
/// populated state.
pub struct DataVolumeBackupAction {
    lookup: Arc<dyn ClusterLookup>,
}

impl DataVolumeBackupAction {
    /// Create the action over a cluster lookup
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self { lookup }
    }

    async fn backup_claim(
        &self,
        mut item: DynamicObject,
        cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let pvc: PersistentVolumeClaim = narrow(&item)?;
        let owner = pvc
            .metadata
            .owner_references
            .iter()
            .flatten()
            .find(|r| r.kind == ResourceKind::DataVolume.kind_str())
            .map(|r| r.name.clone());
        let Some(owner) = owner else {
            return Ok(BackupOutcome::unchanged(item));
        };

        let namespace = item.namespace_str().to_string();
        item.annotations_mut()
            .insert(ANN_POPULATED_FOR.to_string(), owner.clone());

        let dv = ScopedLookup::new(self.lookup.as_ref(), cancel)
            .get_data_volume(&namespace, &owner)
            .await?;
        if !dv.is_succeeded() {
            debug!(
                claim = %item.name_str(),
                dv = %owner,
                phase = ?dv.phase(),
                "claim captured mid-population"
            );
            item.annotations_mut()
                .insert(ANN_IN_PROGRESS.to_string(), "true".to_string());
        }
        Ok(BackupOutcome::unchanged(item))
    }

    fn backup_data_volume(&self, mut item: DynamicObject) -> Result<BackupOutcome, ActionError> {
        let dv: DataVolume = narrow(&item)?;
        if !dv.is_succeeded() {
            return Ok(BackupOutcome::unchanged(item));
        }
        item.annotations_mut()
            .insert(ANN_PRE_POPULATED.to_string(), dv.name().to_string());
        let claim = ResourceRef::new(
            ResourceKind::PersistentVolumeClaim,
            dv.namespace(),
            dv.name(),
        );
        Ok(BackupOutcome::with_extras(item, vec![claim]))
    }
}

#[async_trait]
impl BackupItemAction for DataVolumeBackupAction {
    fn name(&self) -> &'static str {
        "backup-datavolume-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::DataVolume,
        ])
    }

    #[instrument(skip_all, fields(backup = %backup.name(), kind = %item.kind_str()))]
    async fn execute(
        &self,
        item: DynamicObject,
        backup: &Backup,
        cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let kind = item.kind_str().to_string();
        match kind.as_str() {
            "PersistentVolumeClaim" => self.backup_claim(item, cancel).await,
            "DataVolume" => self.backup_data_volume(item),
            _ => Ok(BackupOutcome::unchanged(item)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::test_support::{annotation, backup, data_volume, item, MockLookup};

    fn claim_item(owned_by_dv: bool) -> DynamicObject {
        let mut value = json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {"name": "disk", "namespace": "ns", "uid": "pvc-uid"},
            "spec": {"accessModes": ["ReadWriteOnce"]}
        });
        if owned_by_dv {
            value["metadata"]["ownerReferences"] = json!([{
                "apiVersion": "cdi.kubevirt.io/v1beta1", "kind": "DataVolume",
                "name": "disk", "uid": "dv-uid"
            }]);
        }
        item(value)
    }

    fn dv_item(phase: &str) -> DynamicObject {
        item(json!({
            "apiVersion": "cdi.kubevirt.io/v1beta1",
            "kind": "DataVolume",
            "metadata": {"name": "disk", "namespace": "ns"},
            "spec": {"source": {"http": {"url": "https://example.com/disk.img"}}},
            "status": {"phase": phase}
        }))
    }

    async fn run(
        action: &DataVolumeBackupAction,
        item: DynamicObject,
    ) -> (DynamicObject, Vec<ResourceRef>) {
        match action
            .execute(item, &backup(&[]), &CancellationToken::new())
            .await
            .unwrap()
        {
            BackupOutcome::Continue { item, extras } => (item, extras),
            BackupOutcome::Skip => panic!("population action never skips"),
        }
    }

    #[tokio::test]
    async fn claim_of_finished_data_volume_is_marked_populated_for() {
        let mut mock = MockLookup::new();
        mock.expect_get_data_volume().returning(|_, name| {
            assert_eq!(name, "disk");
            Ok(data_volume(name, "Succeeded"))
        });
        let action = DataVolumeBackupAction::new(Arc::new(mock));

        let (item, extras) = run(&action, claim_item(true)).await;
        assert_eq!(annotation(&item, ANN_POPULATED_FOR), Some("disk"));
        assert_eq!(annotation(&item, ANN_IN_PROGRESS), None);
        assert!(extras.is_empty());
    }

    #[tokio::test]
    async fn claim_of_importing_data_volume_is_marked_in_progress() {
        let mut mock = MockLookup::new();
        mock.expect_get_data_volume()
            .returning(|_, name| Ok(data_volume(name, "ImportInProgress")));
        let action = DataVolumeBackupAction::new(Arc::new(mock));

        let (item, _) = run(&action, claim_item(true)).await;
        assert_eq!(annotation(&item, ANN_POPULATED_FOR), Some("disk"));
        assert_eq!(annotation(&item, ANN_IN_PROGRESS), Some("true"));
    }

    #[tokio::test]
    async fn claim_without_data_volume_owner_is_untouched() {
        let action = DataVolumeBackupAction::new(Arc::new(MockLookup::new()));
        let original = claim_item(false);
        let (item, _) = run(&action, original.clone()).await;
        assert_eq!(item.metadata, original.metadata);
    }

    #[tokio::test]
    async fn succeeded_data_volume_is_pre_populated_and_pulls_claim() {
        let action = DataVolumeBackupAction::new(Arc::new(MockLookup::new()));
        let (item, extras) = run(&action, dv_item("Succeeded")).await;
        assert_eq!(annotation(&item, ANN_PRE_POPULATED), Some("disk"));
        assert_eq!(
            extras,
            vec![ResourceRef::new(ResourceKind::PersistentVolumeClaim, "ns", "disk")]
        );
    }

    #[tokio::test]
    async fn unfinished_data_volume_is_never_pre_populated() {
        let action = DataVolumeBackupAction::new(Arc::new(MockLookup::new()));
        for phase in ["Pending", "ImportScheduled", "ImportInProgress", "Failed"] {
            let (item, extras) = run(&action, dv_item(phase)).await;
            assert_eq!(annotation(&item, ANN_PRE_POPULATED), None, "{}", phase);
            assert!(extras.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_owner_data_volume_fails_the_item() {
        let mut mock = MockLookup::new();
        mock.expect_get_data_volume().returning(|namespace, name| {
            Err(kubevirt_velero_graph::LookupError::NotFound {
                kind: "DataVolume".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
        });
        let action = DataVolumeBackupAction::new(Arc::new(mock));

        let err = action
            .execute(claim_item(true), &backup(&[]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Lookup(ref e) if e.is_not_found()));
    }
}
