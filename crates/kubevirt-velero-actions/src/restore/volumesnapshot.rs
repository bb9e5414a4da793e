//! VolumeSnapshot restore action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;

use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{ResourceKind, ANN_ORIGINAL_SNAPSHOT_UID_BEFORE_BACKUP};

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::ActionError;
use crate::identity::reverse_identity;

/// Undoes identity labeling on snapshots.
#[derive(Debug, Default)]
pub struct VolumeSnapshotRestoreAction;

impl VolumeSnapshotRestoreAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RestoreItemAction for VolumeSnapshotRestoreAction {
    fn name(&self) -> &'static str {
        "restore-volumesnapshot-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VolumeSnapshot])
    }

    async fn execute(
        &self,
        mut item: DynamicObject,
        _restore: &Restore,
        _cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        reverse_identity(&mut item.metadata, ANN_ORIGINAL_SNAPSHOT_UID_BEFORE_BACKUP);
        Ok(RestoreOutcome::restore(item, Vec::new()))
    }
}
