//! VolumeSnapshot identity backup action

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use kubevirt_velero_common::crd::VolumeSnapshot;
use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::{ResourceKind, ANN_ORIGINAL_SNAPSHOT_UID_BEFORE_BACKUP};
use kubevirt_velero_graph::{ClusterLookup, ScopedLookup};

use crate::action::{BackupItemAction, BackupOutcome, ResourceSelector};
use crate::error::{narrow, ActionError};
use crate::identity::{stamp_identity, ClaimUidCache};

/// Labels snapshots with the uid of the claim they were taken from.
pub struct VolumeSnapshotBackupAction {
    lookup: Arc<dyn ClusterLookup>,
    claims: ClaimUidCache,
}

impl VolumeSnapshotBackupAction {
    /// Create the action over a cluster lookup
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self {
            lookup,
            claims: ClaimUidCache::new(),
        }
    }
}

#[async_trait]
impl BackupItemAction for VolumeSnapshotBackupAction {
    fn name(&self) -> &'static str {
        "backup-volumesnapshot-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VolumeSnapshot])
    }

    #[instrument(skip_all, fields(backup = %backup.name()))]
    async fn execute(
        &self,
        mut item: DynamicObject,
        backup: &Backup,
        cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError> {
        let snapshot: VolumeSnapshot = narrow(&item)?;
        let Some(claim) = snapshot.source_claim_name() else {
            return Ok(BackupOutcome::unchanged(item));
        };

        let namespace = item.namespace_str().to_string();
        let lookup = ScopedLookup::new(self.lookup.as_ref(), cancel);
        let uid = self
            .claims
            .uid_of(backup.name(), &namespace, claim, lookup)
            .await?;
        let Some(uid) = uid else {
            debug!(snapshot = %item.name_str(), claim = %claim, "source claim not found");
            return Ok(BackupOutcome::unchanged(item));
        };

        stamp_identity(
            &mut item.metadata,
            &uid,
            ANN_ORIGINAL_SNAPSHOT_UID_BEFORE_BACKUP,
        );
        Ok(BackupOutcome::unchanged(item))
    }
}
