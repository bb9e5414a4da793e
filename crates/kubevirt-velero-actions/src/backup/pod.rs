//! Pod backup action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kubevirt_velero_common::kube_utils::{has_label, ItemExt};
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{ResourceKind, HOTPLUG_DISK, LABEL_KUBEVIRT};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::ActionError;

/// Drops hotplug attachment pods; their volumes are captured through the instance.
#[derive(Debug, Default)]
pub struct PodBackupAction;

impl PodBackupAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackupItemAction for PodBackupAction {
    fn name(&self) -> &'static str {
        "backup-pod-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::Pod])
    }

    async fn execute(
        &self,
        item: DynamicObject,
        _backup: &Backup,
        _cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        if has_label(&item.metadata, LABEL_KUBEVIRT, HOTPLUG_DISK) {
            debug!(pod = %item.name_str(), namespace = %item.namespace_str(), "skipping hotplug pod");
            return Ok(BackupOutcome::Skip);
        }
        Ok(BackupOutcome::unchanged(item))
    }
}
