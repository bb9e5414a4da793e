//! Restore item actions

mod datavolume;
mod pod;
mod pvc;
mod vm;
mod vmi;
mod volumesnapshot;

pub use datavolume::DataVolumeRestoreAction;
pub use pod::PodRestoreAction;
pub use pvc::PvcRestoreAction;
pub use vm::VmRestoreAction;
pub use vmi::VmiRestoreAction;
pub use volumesnapshot::VolumeSnapshotRestoreAction;

use kube::api::DynamicObject;

use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::RESTRICTED_LABELS;

/// Drop node placement and lifecycle labels that only make sense on the source cluster.
pub(crate) fn strip_restricted_labels(labels: &mut std::collections::BTreeMap<String, String>) {
    for key in RESTRICTED_LABELS {
        labels.remove(*key);
    }
}

/// [`strip_restricted_labels`] on an item's own metadata
pub(crate) fn strip_item_restricted_labels(item: &mut DynamicObject) {
    if item.metadata.labels.is_some() {
        strip_restricted_labels(item.labels_mut());
        item.prune_empty_metadata();
    }
}
