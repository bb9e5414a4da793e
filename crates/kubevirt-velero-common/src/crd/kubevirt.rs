//! KubeVirt VirtualMachine and VirtualMachineInstance views

use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

/// KubeVirt VirtualMachine (kubevirt.io/v1)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// VM specification
    #[serde(default)]
    pub spec: VirtualMachineSpec,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VirtualMachineStatus>,
}

impl VirtualMachine {
    /// VM name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// VM namespace
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Whether a VirtualMachineInstance currently exists for this VM
    pub fn is_created(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.created)
    }

    /// Printable status, `Unknown` when the VM has no status yet
    pub fn printable_status(&self) -> PrintableStatus {
        self.status
            .as_ref()
            .and_then(|s| s.printable_status.clone())
            .unwrap_or(PrintableStatus::Unknown)
    }

    /// Template instance spec, if the VM carries one
    pub fn template_spec(&self) -> Option<&VirtualMachineInstanceSpec> {
        self.spec.template.as_ref()?.spec.as_ref()
    }
}

/// VirtualMachine spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Legacy run flag (mutually exclusive with `run_strategy`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    /// Run strategy (Always, Halted, Manual, RerunOnFailure, Once)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,
    /// Instancetype matcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<RevisionMatcher>,
    /// Preference matcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<RevisionMatcher>,
    /// Template of the instance this VM starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<VirtualMachineInstanceTemplateSpec>,
    /// DataVolumes created and owned by the VM
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_volume_templates: Vec<DataVolumeTemplateSpec>,
}

/// Reference from a VM to an instancetype or preference
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionMatcher {
    /// Name of the referenced object
    #[serde(default)]
    pub name: String,
    /// Kind of the referenced object (namespaced or cluster-scoped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// ControllerRevision name recorded by older KubeVirt releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
}

/// VM instance template
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceTemplateSpec {
    /// Template metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    /// Template instance spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<VirtualMachineInstanceSpec>,
}

/// DataVolume template embedded in a VM
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeTemplateSpec {
    /// Template metadata; the namespace defaults to the VM's
    #[serde(default)]
    pub metadata: ObjectMeta,
}

/// VirtualMachine status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    /// Whether the VMI exists
    #[serde(default)]
    pub created: bool,
    /// Human readable state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<PrintableStatus>,
    /// Resolved instancetype revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype_ref: Option<InstancetypeStatusRef>,
    /// Resolved preference revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_ref: Option<InstancetypeStatusRef>,
}

/// Printable status of a VM
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrintableStatus {
    /// Stopped
    Stopped,
    /// Provisioning
    Provisioning,
    /// Starting
    Starting,
    /// Running
    Running,
    /// Paused
    Paused,
    /// Stopping
    Stopping,
    /// Terminating
    Terminating,
    /// Migrating
    Migrating,
    /// Any other status, including error states
    #[serde(other)]
    Unknown,
}

impl PrintableStatus {
    /// Whether the workload is starting or running (not quiesced)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Resolved instancetype or preference reference in VM status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstancetypeStatusRef {
    /// Revision holding the captured spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_revision_ref: Option<ControllerRevisionRef>,
}

/// Reference to a ControllerRevision
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRevisionRef {
    /// Revision name
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// VirtualMachineInstance
// =============================================================================

/// KubeVirt VirtualMachineInstance (kubevirt.io/v1)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstance {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Instance spec
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VirtualMachineInstanceStatus>,
}

impl VirtualMachineInstance {
    /// Instance name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Instance namespace
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Whether the instance is managed by a VirtualMachine
    pub fn is_owned(&self) -> bool {
        self.metadata
            .owner_references
            .as_ref()
            .is_some_and(|refs| !refs.is_empty())
    }

    /// Name of the owning VirtualMachine, if any
    pub fn owner_vm_name(&self) -> Option<&str> {
        self.metadata
            .owner_references
            .as_ref()?
            .iter()
            .find(|r| r.kind == "VirtualMachine")
            .map(|r| r.name.as_str())
    }

    /// Whether the `Paused` condition is true
    pub fn is_paused(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.conditions
                .iter()
                .any(|c| c.type_ == "Paused" && c.status == "True")
        })
    }
}

/// VirtualMachineInstance status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VirtualMachineInstanceCondition>,
}

/// A VMI condition
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VirtualMachineInstanceCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False" or "Unknown"
    #[serde(default)]
    pub status: String,
}

/// VirtualMachineInstance spec (also the VM template spec)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Domain definition
    #[serde(default)]
    pub domain: DomainSpec,
    /// Volumes, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    /// Credentials propagated into the guest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_credentials: Vec<AccessCredential>,
}

impl VirtualMachineInstanceSpec {
    /// Whether the instance keeps TPM or EFI state in a backend claim
    pub fn has_persistent_state(&self) -> bool {
        let tpm = self
            .domain
            .devices
            .tpm
            .as_ref()
            .and_then(|t| t.persistent)
            .unwrap_or(false);
        let efi = self
            .domain
            .firmware
            .as_ref()
            .and_then(|f| f.bootloader.as_ref())
            .and_then(|b| b.efi.as_ref())
            .and_then(|e| e.persistent)
            .unwrap_or(false);
        tpm || efi
    }
}

/// Domain spec (only the persistence-relevant parts)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    /// Devices
    #[serde(default)]
    pub devices: Devices,
    /// Firmware
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<Firmware>,
}

/// Devices
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    /// Emulated TPM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<Tpm>,
}

/// TPM device
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tpm {
    /// Keep TPM state across restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

/// Firmware
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Firmware {
    /// Bootloader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader: Option<Bootloader>,
}

/// Bootloader
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bootloader {
    /// EFI bootloader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efi: Option<Efi>,
}

/// EFI bootloader
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Efi {
    /// Keep NVRAM across restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

// =============================================================================
// Volumes
// =============================================================================

/// A VMI volume. Exactly one source is expected to be set; the first one
/// found in [`Volume::edge`] order wins.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name (matches a disk)
    #[serde(default)]
    pub name: String,
    /// DataVolume source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume: Option<DataVolumeVolumeSource>,
    /// Claim source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimVolumeSource>,
    /// Memory dump target claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_dump: Option<MemoryDumpVolumeSource>,
    /// ConfigMap source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
    /// Secret source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// ServiceAccount source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountVolumeSource>,
}

/// The object a volume depends on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeEdge<'a> {
    /// A DataVolume (and, by convention, the claim of the same name)
    DataVolume(&'a str),
    /// A claim
    PersistentVolumeClaim(&'a str),
    /// A memory dump claim
    MemoryDump(&'a str),
    /// A ConfigMap
    ConfigMap(&'a str),
    /// A Secret
    Secret(&'a str),
    /// A ServiceAccount
    ServiceAccount(&'a str),
}

impl Volume {
    /// The first populated source that contributes a graph edge.
    ///
    /// Container disks, cloud-init and other inline sources return `None`.
    pub fn edge(&self) -> Option<VolumeEdge<'_>> {
        if let Some(dv) = &self.data_volume {
            return Some(VolumeEdge::DataVolume(&dv.name));
        }
        if let Some(pvc) = &self.persistent_volume_claim {
            return Some(VolumeEdge::PersistentVolumeClaim(&pvc.claim_name));
        }
        if let Some(md) = &self.memory_dump {
            return Some(VolumeEdge::MemoryDump(&md.claim_name));
        }
        if let Some(cm) = &self.config_map {
            return Some(VolumeEdge::ConfigMap(&cm.name));
        }
        if let Some(secret) = &self.secret {
            return Some(VolumeEdge::Secret(&secret.secret_name));
        }
        if let Some(sa) = &self.service_account {
            return Some(VolumeEdge::ServiceAccount(&sa.service_account_name));
        }
        None
    }
}

/// DataVolume volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeVolumeSource {
    /// DataVolume name
    #[serde(default)]
    pub name: String,
    /// Attached through hotplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotpluggable: Option<bool>,
}

/// Claim volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimVolumeSource {
    /// Claim name
    #[serde(default)]
    pub claim_name: String,
    /// Attached through hotplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotpluggable: Option<bool>,
}

/// Memory dump volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDumpVolumeSource {
    /// Claim receiving the dump
    #[serde(default)]
    pub claim_name: String,
}

/// ConfigMap volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapVolumeSource {
    /// ConfigMap name
    #[serde(default)]
    pub name: String,
}

/// Secret volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name
    #[serde(default)]
    pub secret_name: String,
}

/// ServiceAccount volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountVolumeSource {
    /// ServiceAccount name
    #[serde(default)]
    pub service_account_name: String,
}

// =============================================================================
// Access credentials
// =============================================================================

/// Access credential injected into the guest
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredential {
    /// SSH public keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<AccessCredentialSource>,
    /// User passwords
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_password: Option<AccessCredentialSource>,
}

impl AccessCredential {
    /// Name of the secret backing this credential, if any
    pub fn secret_name(&self) -> Option<&str> {
        self.ssh_public_key
            .as_ref()
            .or(self.user_password.as_ref())
            .and_then(|c| c.source.secret.as_ref())
            .map(|s| s.secret_name.as_str())
    }
}

/// Credential wrapper (`{source: {secret: {...}}}`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredentialSource {
    /// Where the credential comes from
    #[serde(default)]
    pub source: CredentialSource,
}

/// Credential source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSource {
    /// Secret holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretRef>,
}

/// Secret reference
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Secret name
    #[serde(default)]
    pub secret_name: String,
}
