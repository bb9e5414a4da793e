//! CSI VolumeSnapshot view

use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

/// VolumeSnapshot (snapshot.storage.k8s.io/v1)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshot {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Snapshot spec
    #[serde(default)]
    pub spec: VolumeSnapshotSpec,
}

impl VolumeSnapshot {
    /// Name of the claim this snapshot was taken from, if any
    pub fn source_claim_name(&self) -> Option<&str> {
        self.spec
            .source
            .persistent_volume_claim_name
            .as_deref()
            .filter(|n| !n.is_empty())
    }
}

/// VolumeSnapshot spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSpec {
    /// Snapshot source
    #[serde(default)]
    pub source: VolumeSnapshotSource,
}

/// VolumeSnapshot source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSource {
    /// Source claim (dynamic snapshot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim_name: Option<String>,
    /// Pre-provisioned content (static snapshot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_content_name: Option<String>,
}
