//! Whether a backup request yields a restorable artifact
//!
//! A running VM captured without its instance and launcher pod restores as
//! a cold disk with no record of the live domain. A standalone instance
//! captured without its volumes cannot be restored at all. These checks
//! reject such requests before anything is written.

use thiserror::Error;
use tracing::debug;

use kubevirt_velero_common::crd::{
    VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceSpec, VolumeEdge,
};
use kubevirt_velero_common::kube_utils::is_excluded_by_label;
use kubevirt_velero_common::velero::Backup;

use crate::error::LookupError;
use crate::inclusion::{is_metadata_backup, is_resource_in_backup, is_resource_included};
use crate::lookup::ScopedLookup;

/// Outcome of the instance safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceVerdict {
    /// Skip the instance; its owner is not part of this backup
    Exclude,
    /// Back up the instance and mark it as owned by a VirtualMachine
    Owned,
    /// Back up a standalone instance
    Standalone,
}

/// Why an instance cannot be backed up safely
#[derive(Debug, Error)]
pub enum SafetyError {
    /// The backup request would produce an unrestorable artifact
    #[error("{reason}")]
    Unsafe {
        /// Human readable reason
        reason: String,
    },

    /// A lookup needed to reach a verdict failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl SafetyError {
    fn unsafe_backup(reason: impl Into<String>) -> Self {
        Self::Unsafe {
            reason: reason.into(),
        }
    }
}

/// Whether `vm` can be backed up under `backup` without losing its live state.
///
/// Only Starting/Running VMs are constrained, and only when the request
/// names resources explicitly: the instance and its pod must both be in.
pub fn vm_can_be_safely_backed_up(vm: &VirtualMachine, backup: &Backup) -> bool {
    if !vm.printable_status().is_active() {
        return true;
    }
    if backup.spec.included_resources.is_empty() {
        return true;
    }
    is_resource_included("virtualmachineinstances", backup) && is_resource_included("pods", backup)
}

/// Names of volumes whose backing claim or DataVolume is left out of `backup`.
pub fn volumes_missing_from_backup(
    spec: &VirtualMachineInstanceSpec,
    backup: &Backup,
) -> Vec<String> {
    spec.volumes
        .iter()
        .filter(|volume| match volume.edge() {
            Some(VolumeEdge::DataVolume(_)) => !is_resource_in_backup("datavolumes", backup),
            Some(VolumeEdge::PersistentVolumeClaim(_)) | Some(VolumeEdge::MemoryDump(_)) => {
                !is_resource_in_backup("persistentvolumeclaims", backup)
            }
            _ => false,
        })
        .map(|volume| volume.name.clone())
        .collect()
}

/// Decide what to do with an instance under `backup`.
pub async fn assess_instance(
    vmi: &VirtualMachineInstance,
    backup: &Backup,
    lookup: ScopedLookup<'_>,
) -> Result<InstanceVerdict, SafetyError> {
    if should_exclude(vmi, backup, lookup).await? {
        debug!(
            instance = %vmi.name(),
            namespace = %vmi.namespace(),
            "owner VM not in backup, excluding instance"
        );
        return Ok(InstanceVerdict::Exclude);
    }

    if !vmi.is_paused() {
        if !is_resource_in_backup("pods", backup)
            && is_resource_in_backup("persistentvolumeclaims", backup)
        {
            return Err(SafetyError::unsafe_backup(format!(
                "VM {}/{} is running but its launcher pod is not included in the backup",
                vmi.namespace(),
                vmi.name()
            )));
        }

        if let Some(pod) = lookup.get_runner_pod(vmi.name(), vmi.namespace()).await? {
            if is_excluded_by_label(&pod.metadata) {
                return Err(SafetyError::unsafe_backup(format!(
                    "VM {}/{} is running but its launcher pod is excluded by label",
                    vmi.namespace(),
                    vmi.name()
                )));
            }
        }
    }

    if vmi.is_owned() {
        return Ok(InstanceVerdict::Owned);
    }

    if !is_metadata_backup(backup) {
        let missing = volumes_missing_from_backup(&vmi.spec, backup);
        if !missing.is_empty() {
            return Err(SafetyError::unsafe_backup(format!(
                "VM has volumes not included in the backup: {}",
                missing.join(", ")
            )));
        }
    }

    Ok(InstanceVerdict::Standalone)
}

/// An owned instance is skipped when its VM is not captured by this backup.
async fn should_exclude(
    vmi: &VirtualMachineInstance,
    backup: &Backup,
    lookup: ScopedLookup<'_>,
) -> Result<bool, LookupError> {
    if !vmi.is_owned() {
        return Ok(false);
    }
    if !is_resource_in_backup("virtualmachines", backup) {
        return Ok(true);
    }
    let owner = vmi.owner_vm_name().unwrap_or(vmi.name());
    let vm = lookup.get_virtual_machine(vmi.namespace(), owner).await?;
    Ok(is_excluded_by_label(&vm.metadata))
}
