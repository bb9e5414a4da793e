//! Claim identity backup action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{ResourceKind, ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::ActionError;
use crate::identity::stamp_identity;

/// Labels each captured claim with its own uid.
#[derive(Debug, Default)]
pub struct PvcBackupAction;

impl PvcBackupAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackupItemAction for PvcBackupAction {
    fn name(&self) -> &'static str {
        "backup-pvc-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::PersistentVolumeClaim])
    }

    async fn execute(
        &self,
        mut item: DynamicObject,
        _backup: &Backup,
        _cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let uid = item.metadata.uid.clone().unwrap_or_default();
        if stamp_identity(&mut item.metadata, &uid, ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP) {
            debug!(claim = %item.name_str(), namespace = %item.namespace_str(), "labelled claim identity");
        }
        Ok(BackupOutcome::unchanged(item))
    }
}
