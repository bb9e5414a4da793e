//! Object graph expansion
//!
//! Given a root object (VirtualMachine, VirtualMachineInstance or
//! DataVolume), produce the ordered list of references that must travel
//! with it through a backup or a restore.
//!
//! Expansion never short-circuits: a failed lookup is recorded and the
//! remaining edges are still emitted, so callers always get the partial
//! graph together with every error met along the way.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use tracing::{debug, warn};

use kubevirt_velero_common::crd::{
    DataVolume, InstancetypeStatusRef, RevisionMatcher, VirtualMachine, VirtualMachineInstance,
    VirtualMachineInstanceSpec, VolumeEdge,
};
use kubevirt_velero_common::kube_utils::annotation;
use kubevirt_velero_common::{
    ResourceKind, ResourceRef, ANN_POPULATED_FOR, LABEL_PERSISTENT_STATE_FOR,
    PERSISTENT_STATE_PREFIX,
};

use crate::error::{AggregateError, LookupError};
use crate::lookup::ScopedLookup;

/// Which direction the graph is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// Objects to capture alongside the root
    Backup,
    /// Objects to recreate alongside the root
    Restore,
}

/// Root object of an expansion
#[derive(Debug, Clone, Copy)]
pub enum GraphRoot<'a> {
    /// A VirtualMachine
    VirtualMachine(&'a VirtualMachine),
    /// A VirtualMachineInstance
    Instance(&'a VirtualMachineInstance),
    /// A DataVolume
    DataVolume(&'a DataVolume),
    /// Any other kind; expands to nothing
    Other,
}

/// Ordered references plus the lookup failures met while collecting them
#[derive(Debug, Default)]
pub struct ObjectGraph {
    refs: Vec<ResourceRef>,
    errors: Vec<LookupError>,
}

impl ObjectGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference to an object of `kind`. Empty names are ignored.
    pub fn push(&mut self, kind: ResourceKind, namespace: &str, name: &str) {
        if name.is_empty() {
            debug!(kind = %kind, namespace = %namespace, "skipping edge with empty name");
            return;
        }
        self.refs.push(ResourceRef::new(kind, namespace, name));
    }

    /// Append a reference by short tag; unknown tags are dropped.
    ///
    /// Returns whether the reference was added.
    pub fn push_tag(&mut self, tag: &str, namespace: &str, name: &str) -> bool {
        match ResourceKind::lookup(tag) {
            Some(kind) if !name.is_empty() => {
                self.push(kind, namespace, name);
                true
            }
            Some(_) => false,
            None => {
                debug!(tag = %tag, name = %name, "dropping edge with unknown resource tag");
                false
            }
        }
    }

    /// Record a lookup failure. Cancellation is recorded once.
    pub fn record(&mut self, err: LookupError) {
        if err.is_cancelled() && self.errors.iter().any(LookupError::is_cancelled) {
            return;
        }
        self.errors.push(err);
    }

    /// Append another graph's references and errors
    pub fn extend(&mut self, other: ObjectGraph) {
        self.refs.extend(other.refs);
        for err in other.errors {
            self.record(err);
        }
    }

    /// References in emission order
    pub fn refs(&self) -> &[ResourceRef] {
        &self.refs
    }

    /// Lookup failures in the order they happened
    pub fn errors(&self) -> &[LookupError] {
        &self.errors
    }

    /// Whether every lookup succeeded
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Split into the references and the aggregate error, if any
    pub fn into_parts(self) -> (Vec<ResourceRef>, Option<AggregateError>) {
        (self.refs, AggregateError::from_errors(self.errors))
    }
}

/// Remove repeated references, keeping the first occurrence of each.
pub fn dedup_refs(refs: Vec<ResourceRef>) -> Vec<ResourceRef> {
    let mut seen = HashSet::with_capacity(refs.len());
    refs.into_iter().filter(|r| seen.insert(r.clone())).collect()
}

/// Restore graph of a claim: the DataVolume it was populated for, if any.
///
/// Pure; the claim carries everything needed.
pub fn claim_restore_graph(pvc: &PersistentVolumeClaim) -> ObjectGraph {
    let mut graph = ObjectGraph::new();
    if let Some(dv) = annotation(&pvc.metadata, ANN_POPULATED_FOR) {
        let namespace = pvc.metadata.namespace.as_deref().unwrap_or_default();
        graph.push(ResourceKind::DataVolume, namespace, dv);
    }
    graph
}

/// Expands roots into ordered reference lists
pub struct GraphBuilder<'a> {
    lookup: ScopedLookup<'a>,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder over a cancellation-scoped lookup
    pub fn new(lookup: ScopedLookup<'a>) -> Self {
        Self { lookup }
    }

    /// Objects to back up together with `root`
    pub async fn backup_graph(&self, root: GraphRoot<'_>) -> ObjectGraph {
        self.build(root, GraphMode::Backup).await
    }

    /// Objects to restore together with `root`
    pub async fn restore_graph(&self, root: GraphRoot<'_>) -> ObjectGraph {
        self.build(root, GraphMode::Restore).await
    }

    /// Expand `root` in the given mode
    pub async fn build(&self, root: GraphRoot<'_>, mode: GraphMode) -> ObjectGraph {
        let mut graph = ObjectGraph::new();
        match root {
            GraphRoot::VirtualMachine(vm) => self.expand_vm(vm, mode, &mut graph).await,
            GraphRoot::Instance(vmi) => self.expand_instance(vmi, mode, &mut graph).await,
            GraphRoot::DataVolume(dv) => expand_data_volume(dv, &mut graph),
            GraphRoot::Other => {}
        }
        debug!(
            mode = ?mode,
            refs = graph.refs().len(),
            errors = graph.errors().len(),
            "expanded object graph"
        );
        graph
    }

    async fn expand_vm(&self, vm: &VirtualMachine, mode: GraphMode, graph: &mut ObjectGraph) {
        let namespace = vm.namespace();
        let status = vm.status.as_ref();

        if let Some(instancetype) = &vm.spec.instancetype {
            push_typing(
                graph,
                instancetype,
                status.and_then(|s| s.instancetype_ref.as_ref()),
                namespace,
                ResourceKind::VirtualMachineClusterInstancetype,
            );
        }
        if let Some(preference) = &vm.spec.preference {
            push_typing(
                graph,
                preference,
                status.and_then(|s| s.preference_ref.as_ref()),
                namespace,
                ResourceKind::VirtualMachineClusterPreference,
            );
        }

        if mode == GraphMode::Backup && vm.is_created() {
            graph.push(ResourceKind::VirtualMachineInstance, namespace, vm.name());
            self.push_runner_pod(vm.name(), namespace, graph).await;
        }

        if let Some(spec) = vm.template_spec() {
            self.expand_instance_spec(spec, vm.name(), namespace, mode, graph)
                .await;
        }
    }

    async fn expand_instance(
        &self,
        vmi: &VirtualMachineInstance,
        mode: GraphMode,
        graph: &mut ObjectGraph,
    ) {
        if mode == GraphMode::Backup {
            self.push_runner_pod(vmi.name(), vmi.namespace(), graph)
                .await;
        }
        self.expand_instance_spec(&vmi.spec, vmi.name(), vmi.namespace(), mode, graph)
            .await;
    }

    /// Volumes, persistent state, then access credentials, in declaration order.
    async fn expand_instance_spec(
        &self,
        spec: &VirtualMachineInstanceSpec,
        vm_name: &str,
        namespace: &str,
        mode: GraphMode,
        graph: &mut ObjectGraph,
    ) {
        for volume in &spec.volumes {
            match volume.edge() {
                Some(VolumeEdge::DataVolume(name)) => {
                    graph.push(ResourceKind::DataVolume, namespace, name);
                    if mode == GraphMode::Backup {
                        graph.push(ResourceKind::PersistentVolumeClaim, namespace, name);
                    }
                }
                Some(VolumeEdge::PersistentVolumeClaim(name))
                | Some(VolumeEdge::MemoryDump(name)) => {
                    graph.push(ResourceKind::PersistentVolumeClaim, namespace, name);
                }
                Some(VolumeEdge::ConfigMap(name)) => {
                    graph.push(ResourceKind::ConfigMap, namespace, name);
                }
                Some(VolumeEdge::Secret(name)) => {
                    graph.push(ResourceKind::Secret, namespace, name);
                }
                Some(VolumeEdge::ServiceAccount(name)) => {
                    graph.push(ResourceKind::ServiceAccount, namespace, name);
                }
                None => {}
            }
        }

        if spec.has_persistent_state() {
            self.push_persistent_state(vm_name, namespace, graph).await;
        }

        for credential in &spec.access_credentials {
            if let Some(secret) = credential.secret_name() {
                graph.push(ResourceKind::Secret, namespace, secret);
            }
        }
    }

    async fn push_runner_pod(&self, instance_name: &str, namespace: &str, graph: &mut ObjectGraph) {
        match self.lookup.get_runner_pod(instance_name, namespace).await {
            Ok(Some(pod)) => {
                let name = pod.metadata.name.as_deref().unwrap_or_default();
                graph.push(ResourceKind::Pod, namespace, name);
            }
            Ok(None) => {
                debug!(instance = %instance_name, namespace = %namespace, "no launcher pod found");
            }
            Err(e) => {
                warn!(instance = %instance_name, namespace = %namespace, error = %e, "launcher pod lookup failed");
                graph.record(e);
            }
        }
    }

    /// Claims labelled `persistent-state-for=<vm>`, or the legacy fixed name when none exist.
    async fn push_persistent_state(&self, vm_name: &str, namespace: &str, graph: &mut ObjectGraph) {
        let selector = format!("{}={}", LABEL_PERSISTENT_STATE_FOR, vm_name);
        match self.lookup.list_claims(&selector, namespace).await {
            Ok(claims) if claims.is_empty() => {
                let legacy = format!("{}{}", PERSISTENT_STATE_PREFIX, vm_name);
                graph.push(ResourceKind::PersistentVolumeClaim, namespace, &legacy);
            }
            Ok(claims) => {
                for claim in &claims {
                    let name = claim.metadata.name.as_deref().unwrap_or_default();
                    let claim_ns = claim.metadata.namespace.as_deref().unwrap_or(namespace);
                    graph.push(ResourceKind::PersistentVolumeClaim, claim_ns, name);
                }
            }
            Err(e) => {
                warn!(vm = %vm_name, namespace = %namespace, error = %e, "persistent state lookup failed");
                graph.record(e);
            }
        }
    }
}

fn expand_data_volume(dv: &DataVolume, graph: &mut ObjectGraph) {
    if dv.is_succeeded() {
        graph.push(ResourceKind::PersistentVolumeClaim, dv.namespace(), dv.name());
    }
}

/// Emit an instancetype/preference and its ControllerRevision.
///
/// The matcher's kind is case-folded and resolved through the registry; an
/// unset kind means the cluster-scoped variant. Unknown kinds are dropped.
fn push_typing(
    graph: &mut ObjectGraph,
    matcher: &RevisionMatcher,
    status_ref: Option<&InstancetypeStatusRef>,
    namespace: &str,
    default_kind: ResourceKind,
) {
    let tag = match matcher.kind.as_deref().map(str::trim) {
        Some(kind) if !kind.is_empty() => kind.to_ascii_lowercase(),
        _ => default_kind.tag().to_string(),
    };
    graph.push_tag(&tag, namespace, &matcher.name);

    let revision = status_ref
        .and_then(|r| r.controller_revision_ref.as_ref())
        .map(|r| r.name.as_str())
        .or(matcher.revision_name.as_deref());
    if let Some(revision) = revision {
        graph.push(ResourceKind::ControllerRevision, namespace, revision);
    }
}
