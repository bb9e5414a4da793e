//! Common types for the KubeVirt Velero plugin: typed objects, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod registry;
pub mod telemetry;
pub mod velero;

pub use error::Error;
pub use registry::{ResourceKind, ResourceRef};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix under which every hook of this plugin is registered
pub const PLUGIN_NAMESPACE: &str = "kubevirt-velero-plugin";

// =============================================================================
// Annotations written during backup
// =============================================================================

/// Marks a claim as already holding its data so CDI skips the import
pub const ANN_PRE_POPULATED: &str = "cdi.kubevirt.io/storage.prePopulated";

/// Binds a claim to the DataVolume (by name) that populated it
pub const ANN_POPULATED_FOR: &str = "cdi.kubevirt.io/storage.populatedFor";

/// Marks a claim captured while its DataVolume was still importing
pub const ANN_IN_PROGRESS: &str = "cdi.kubevirt.io/velero.inProgress";

/// Marks a VirtualMachineInstance as owned by a VirtualMachine
pub const ANN_IS_OWNED: &str = "cdi.kubevirt.io/velero.isOwned";

/// Preserves a user-set identity label value on a claim across backup
pub const ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP: &str =
    "velero.kubevirt.io/originalPVCUIDBeforeBackup";

/// Preserves a user-set identity label value on a volume snapshot across backup
pub const ANN_ORIGINAL_SNAPSHOT_UID_BEFORE_BACKUP: &str =
    "velero.kubevirt.io/originalVolumeSnapshotUIDBeforeBackup";

// =============================================================================
// Labels
// =============================================================================

/// Identity label carrying the uid of the original claim
pub const LABEL_ORIGINAL_PVC_UID: &str = "velero.kubevirt.io/originalPVCUID";

/// Velero's per-object exclusion label
pub const LABEL_EXCLUDE_FROM_BACKUP: &str = "velero.io/exclude-from-backup";

/// Backup request label selecting a metadata-only backup
pub const LABEL_METADATA_BACKUP: &str = "velero.kubevirt.io/metadataBackup";

/// Restore request label overriding the restored VM's run strategy
pub const LABEL_RESTORE_RUN_STRATEGY: &str = "velero.kubevirt.io/restore-run-strategy";

/// Restore request label clearing interface MAC addresses on restored VMs
pub const LABEL_CLEAR_MAC_ADDRESS: &str = "velero.kubevirt.io/clear-mac-address";

/// Restore request label assigning a fresh firmware UUID to restored VMs
pub const LABEL_GENERATE_NEW_FIRMWARE_UUID: &str = "velero.kubevirt.io/generate-new-firmware-uuid";

/// KubeVirt component label key (`kubevirt.io=virt-launcher`, `kubevirt.io=hotplug-disk`)
pub const LABEL_KUBEVIRT: &str = "kubevirt.io";

/// Value of [`LABEL_KUBEVIRT`] on hypervisor runner pods
pub const VIRT_LAUNCHER: &str = "virt-launcher";

/// Value of [`LABEL_KUBEVIRT`] on hotplug attachment pods
pub const HOTPLUG_DISK: &str = "hotplug-disk";

/// Label selector matching runner pods
pub const VIRT_LAUNCHER_SELECTOR: &str = "kubevirt.io=virt-launcher";

/// Annotation on a runner pod naming the instance it hosts
pub const ANN_DOMAIN: &str = "kubevirt.io/domain";

/// Label on persistent-state claims naming the VM they belong to
pub const LABEL_PERSISTENT_STATE_FOR: &str = "persistent-state-for";

/// Name prefix of legacy persistent-state claims
pub const PERSISTENT_STATE_PREFIX: &str = "persistent-state-for-";

/// Node-affinity and lifecycle labels that must not survive a restore
pub const RESTRICTED_LABELS: &[&str] = &[
    "kubevirt.io/created-by",
    "kubevirt.io/migrationJobUID",
    "kubevirt.io/nodeName",
    "kubevirt.io/migrationTargetNodeName",
    "kubevirt.io/schedulable",
    "kubevirt.io/install-strategy",
];
