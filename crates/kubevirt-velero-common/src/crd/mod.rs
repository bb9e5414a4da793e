//! Typed read views of the third-party objects the plugin inspects
//!
//! Only the fields the plugin reasons about are modelled; everything else
//! is ignored on deserialization. Mutations are applied to the untyped item
//! (see [`crate::kube_utils::ItemExt`]) so unmodelled fields are never lost.

mod cdi;
mod kubevirt;
mod snapshot;

pub use cdi::{
    DataVolume, DataVolumePhase, DataVolumeSource, DataVolumeSourcePvc, DataVolumeSourceRef,
    DataVolumeSpec, DataVolumeStatus,
};
pub use kubevirt::{
    AccessCredential, AccessCredentialSource, Bootloader, ClaimVolumeSource, ConfigMapVolumeSource,
    ControllerRevisionRef, CredentialSource, DataVolumeTemplateSpec, DataVolumeVolumeSource, Devices, DomainSpec,
    Efi, Firmware, InstancetypeStatusRef, MemoryDumpVolumeSource, PrintableStatus, RevisionMatcher,
    SecretRef, SecretVolumeSource, ServiceAccountVolumeSource, Tpm, VirtualMachine,
    VirtualMachineInstance, VirtualMachineInstanceCondition, VirtualMachineInstanceSpec,
    VirtualMachineInstanceStatus, VirtualMachineInstanceTemplateSpec, VirtualMachineSpec,
    VirtualMachineStatus, Volume, VolumeEdge,
};
pub use snapshot::{VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec};
