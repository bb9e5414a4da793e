//! Compile-time resource registry
//!
//! Maps the short resource tags used throughout the plugin (`datavolumes`,
//! `virtualmachineinstancetype`, ...) to fully qualified group/resource
//! pairs. Every reference the graph engine emits is built through this
//! table, so an unknown tag can never leak into an emitted reference.

use std::fmt;

use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};

/// Resource kinds the plugin reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// DataVolume (cdi.kubevirt.io)
    DataVolume,
    /// PersistentVolumeClaim (core)
    PersistentVolumeClaim,
    /// Secret (core)
    Secret,
    /// ConfigMap (core)
    ConfigMap,
    /// ServiceAccount (core)
    ServiceAccount,
    /// Pod (core)
    Pod,
    /// ControllerRevision (apps)
    ControllerRevision,
    /// VirtualMachine (kubevirt.io)
    VirtualMachine,
    /// VirtualMachineInstance (kubevirt.io)
    VirtualMachineInstance,
    /// VirtualMachineInstancetype (instancetype.kubevirt.io)
    VirtualMachineInstancetype,
    /// VirtualMachineClusterInstancetype (instancetype.kubevirt.io)
    VirtualMachineClusterInstancetype,
    /// VirtualMachinePreference (instancetype.kubevirt.io)
    VirtualMachinePreference,
    /// VirtualMachineClusterPreference (instancetype.kubevirt.io)
    VirtualMachineClusterPreference,
    /// VolumeSnapshot (snapshot.storage.k8s.io)
    VolumeSnapshot,
}

/// All ResourceKind variants for iteration.
pub const ALL_RESOURCE_KINDS: &[ResourceKind] = &[
    ResourceKind::DataVolume,
    ResourceKind::PersistentVolumeClaim,
    ResourceKind::Secret,
    ResourceKind::ConfigMap,
    ResourceKind::ServiceAccount,
    ResourceKind::Pod,
    ResourceKind::ControllerRevision,
    ResourceKind::VirtualMachine,
    ResourceKind::VirtualMachineInstance,
    ResourceKind::VirtualMachineInstancetype,
    ResourceKind::VirtualMachineClusterInstancetype,
    ResourceKind::VirtualMachinePreference,
    ResourceKind::VirtualMachineClusterPreference,
    ResourceKind::VolumeSnapshot,
];

impl ResourceKind {
    /// Short tag used to name this kind in graph edges and include lists.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DataVolume => "datavolumes",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::Secret => "secrets",
            Self::ConfigMap => "configmaps",
            Self::ServiceAccount => "serviceaccounts",
            Self::Pod => "pods",
            Self::ControllerRevision => "controllerrevisions",
            Self::VirtualMachine => "virtualmachines",
            Self::VirtualMachineInstance => "virtualmachineinstances",
            Self::VirtualMachineInstancetype => "virtualmachineinstancetype",
            Self::VirtualMachineClusterInstancetype => "virtualmachineclusterinstancetype",
            Self::VirtualMachinePreference => "virtualmachinepreference",
            Self::VirtualMachineClusterPreference => "virtualmachineclusterpreference",
            Self::VolumeSnapshot => "volumesnapshots",
        }
    }

    /// API group (empty for the core group).
    pub fn group(&self) -> &'static str {
        match self {
            Self::DataVolume => "cdi.kubevirt.io",
            Self::PersistentVolumeClaim
            | Self::Secret
            | Self::ConfigMap
            | Self::ServiceAccount
            | Self::Pod => "",
            Self::ControllerRevision => "apps",
            Self::VirtualMachine | Self::VirtualMachineInstance => "kubevirt.io",
            Self::VirtualMachineInstancetype
            | Self::VirtualMachineClusterInstancetype
            | Self::VirtualMachinePreference
            | Self::VirtualMachineClusterPreference => "instancetype.kubevirt.io",
            Self::VolumeSnapshot => "snapshot.storage.k8s.io",
        }
    }

    /// Plural resource name as served by the API server.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::DataVolume => "datavolumes",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::Secret => "secrets",
            Self::ConfigMap => "configmaps",
            Self::ServiceAccount => "serviceaccounts",
            Self::Pod => "pods",
            Self::ControllerRevision => "controllerrevisions",
            Self::VirtualMachine => "virtualmachines",
            Self::VirtualMachineInstance => "virtualmachineinstances",
            Self::VirtualMachineInstancetype => "virtualmachineinstancetypes",
            Self::VirtualMachineClusterInstancetype => "virtualmachineclusterinstancetypes",
            Self::VirtualMachinePreference => "virtualmachinepreferences",
            Self::VirtualMachineClusterPreference => "virtualmachineclusterpreferences",
            Self::VolumeSnapshot => "volumesnapshots",
        }
    }

    /// Kubernetes Kind string.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::DataVolume => "DataVolume",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::ServiceAccount => "ServiceAccount",
            Self::Pod => "Pod",
            Self::ControllerRevision => "ControllerRevision",
            Self::VirtualMachine => "VirtualMachine",
            Self::VirtualMachineInstance => "VirtualMachineInstance",
            Self::VirtualMachineInstancetype => "VirtualMachineInstancetype",
            Self::VirtualMachineClusterInstancetype => "VirtualMachineClusterInstancetype",
            Self::VirtualMachinePreference => "VirtualMachinePreference",
            Self::VirtualMachineClusterPreference => "VirtualMachineClusterPreference",
            Self::VolumeSnapshot => "VolumeSnapshot",
        }
    }

    /// Served version used for API access.
    pub fn version(&self) -> &'static str {
        match self {
            Self::DataVolume => "v1beta1",
            Self::VirtualMachineInstancetype
            | Self::VirtualMachineClusterInstancetype
            | Self::VirtualMachinePreference
            | Self::VirtualMachineClusterPreference => "v1beta1",
            _ => "v1",
        }
    }

    /// Whether objects of this kind live in a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Self::VirtualMachineClusterInstancetype | Self::VirtualMachineClusterPreference
        )
    }

    /// Build the kube `ApiResource` for this kind.
    pub fn api_resource(&self) -> ApiResource {
        let group = self.group();
        let version = self.version();
        ApiResource {
            group: group.to_string(),
            version: version.to_string(),
            kind: self.kind_str().to_string(),
            api_version: if group.is_empty() {
                version.to_string()
            } else {
                format!("{}/{}", group, version)
            },
            plural: self.resource().to_string(),
        }
    }

    /// Resolve a short tag. Returns `None` for tags this build does not know.
    pub fn lookup(tag: &str) -> Option<Self> {
        ALL_RESOURCE_KINDS.iter().copied().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Stable identity of a cluster object, as handed back to Velero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// API group (empty for core)
    pub group: String,
    /// Plural resource name
    pub resource: String,
    /// Namespace (empty for cluster-scoped)
    #[serde(default)]
    pub namespace: String,
    /// Name
    pub name: String,
}

impl ResourceRef {
    /// Create a reference to an object of the given kind.
    ///
    /// Cluster-scoped kinds always get an empty namespace.
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        let namespace = if kind.is_namespaced() { namespace } else { "" };
        Self {
            group: kind.group().to_string(),
            resource: kind.resource().to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a reference from a short tag; `None` if the tag is unknown.
    pub fn from_tag(tag: &str, namespace: &str, name: &str) -> Option<Self> {
        ResourceKind::lookup(tag).map(|kind| Self::new(kind, namespace, name))
    }

    /// Whether this reference points at an object of `kind`.
    pub fn is(&self, kind: ResourceKind) -> bool {
        self.group == kind.group() && self.resource == kind.resource()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gr = if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        };
        if self.namespace.is_empty() {
            write!(f, "{}/{}", gr, self.name)
        } else {
            write!(f, "{}/{}/{}", gr, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for kind in ALL_RESOURCE_KINDS {
            assert_eq!(ResourceKind::lookup(kind.tag()), Some(*kind), "{:?}", kind);
            assert!(!kind.resource().is_empty());
            assert!(!kind.kind_str().is_empty());
        }
        assert_eq!(ALL_RESOURCE_KINDS.len(), 14);
    }

    #[test]
    fn unknown_tag_resolves_to_none() {
        assert_eq!(ResourceKind::lookup("virtualmachinepools"), None);
        assert!(ResourceRef::from_tag("Pods", "ns", "p").is_none());
    }

    #[test]
    fn cluster_scoped_refs_drop_namespace() {
        let r = ResourceRef::new(ResourceKind::VirtualMachineClusterInstancetype, "ns", "u1.small");
        assert_eq!(r.namespace, "");
        assert_eq!(r.group, "instancetype.kubevirt.io");
        assert_eq!(r.resource, "virtualmachineclusterinstancetypes");
        assert_eq!(
            r.to_string(),
            "virtualmachineclusterinstancetypes.instancetype.kubevirt.io/u1.small"
        );
    }

    #[test]
    fn core_api_resource_has_bare_version() {
        let ar = ResourceKind::PersistentVolumeClaim.api_resource();
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.plural, "persistentvolumeclaims");

        let ar = ResourceKind::DataVolume.api_resource();
        assert_eq!(ar.api_version, "cdi.kubevirt.io/v1beta1");
    }

    #[test]
    fn ref_display_includes_namespace() {
        let r = ResourceRef::new(ResourceKind::DataVolume, "ns", "test-vm-dv");
        assert_eq!(r.to_string(), "datavolumes.cdi.kubevirt.io/ns/test-vm-dv");
        assert!(r.is(ResourceKind::DataVolume));
        assert!(!r.is(ResourceKind::PersistentVolumeClaim));
    }
}
