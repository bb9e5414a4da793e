//! CDI DataVolume view

use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

/// CDI DataVolume (cdi.kubevirt.io/v1beta1)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolume {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// DataVolume spec
    #[serde(default)]
    pub spec: DataVolumeSpec,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DataVolumeStatus>,
}

impl DataVolume {
    /// DataVolume name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// DataVolume namespace
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Current phase, `Unknown` when the DataVolume has no status yet
    pub fn phase(&self) -> DataVolumePhase {
        self.status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or(DataVolumePhase::Unknown)
    }

    /// Whether population finished successfully
    pub fn is_succeeded(&self) -> bool {
        self.phase() == DataVolumePhase::Succeeded
    }

    /// Whether the DataVolume is populated by cloning another volume.
    ///
    /// Covers PVC clones, snapshot clones, and `sourceRef`s to a DataSource
    /// (which CDI resolves to one of the two).
    pub fn is_clone(&self) -> bool {
        let source_clone = self
            .spec
            .source
            .as_ref()
            .is_some_and(|s| s.pvc.is_some() || s.snapshot.is_some());
        let ref_clone = self.spec.source.is_none()
            && self
                .spec
                .source_ref
                .as_ref()
                .is_some_and(|r| r.kind == "DataSource");
        source_clone || ref_clone
    }
}

/// DataVolume spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSpec {
    /// Population source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DataVolumeSource>,
    /// Indirect population source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<DataVolumeSourceRef>,
}

/// DataVolume source variants.
///
/// Only the clone variants are inspected; the rest are kept opaque.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSource {
    /// Clone from a claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<DataVolumeSourcePvc>,
    /// Clone from a volume snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<serde_json::Value>,
    /// Upload target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<serde_json::Value>,
    /// Import from a container registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<serde_json::Value>,
    /// Import over HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<serde_json::Value>,
    /// Blank disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blank: Option<serde_json::Value>,
}

/// Claim clone source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSourcePvc {
    /// Source claim namespace
    #[serde(default)]
    pub namespace: String,
    /// Source claim name
    #[serde(default)]
    pub name: String,
}

/// Indirect source reference
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSourceRef {
    /// Kind of the referenced object
    #[serde(default)]
    pub kind: String,
    /// Namespace of the referenced object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the referenced object
    #[serde(default)]
    pub name: String,
}

/// DataVolume status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeStatus {
    /// Phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<DataVolumePhase>,
}

/// DataVolume phase
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataVolumePhase {
    /// Pending
    Pending,
    /// Claim bound
    PVCBound,
    /// Import scheduled
    ImportScheduled,
    /// Import running
    ImportInProgress,
    /// Clone scheduled
    CloneScheduled,
    /// Clone running
    CloneInProgress,
    /// Upload scheduled
    UploadScheduled,
    /// Upload ready
    UploadReady,
    /// Waiting for a consumer pod before binding
    WaitForFirstConsumer,
    /// Waiting for a populator
    PendingPopulation,
    /// Population finished
    Succeeded,
    /// Population failed
    Failed,
    /// Any other phase
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clone_sources_are_detected() {
        let dv: DataVolume = serde_json::from_value(json!({
            "metadata": {"name": "dv", "namespace": "ns"},
            "spec": {"source": {"pvc": {"namespace": "golden", "name": "fedora"}}},
            "status": {"phase": "Succeeded"}
        }))
        .unwrap();
        assert!(dv.is_clone());
        assert!(dv.is_succeeded());

        let dv: DataVolume = serde_json::from_value(json!({
            "spec": {"sourceRef": {"kind": "DataSource", "name": "fedora", "namespace": "os-images"}}
        }))
        .unwrap();
        assert!(dv.is_clone());
        assert_eq!(dv.phase(), DataVolumePhase::Unknown);
    }

    #[test]
    fn import_sources_are_not_clones() {
        let dv: DataVolume = serde_json::from_value(json!({
            "spec": {"source": {"registry": {"url": "docker://quay.io/containerdisks/fedora"}}},
            "status": {"phase": "ImportInProgress"}
        }))
        .unwrap();
        assert!(!dv.is_clone());
        assert!(!dv.is_succeeded());
    }

    #[test]
    fn unrecognised_phase_maps_to_unknown() {
        let status: DataVolumeStatus =
            serde_json::from_value(json!({"phase": "ExpansionInProgress"})).unwrap();
        assert_eq!(status.phase, Some(DataVolumePhase::Unknown));
    }
}
