//! VirtualMachine restore action
//!
//! Restores the VM's supporting objects and applies the run-state and
//! identity rewrites requested through labels on the Velero Restore.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use kubevirt_velero_common::crd::VirtualMachine;
use kubevirt_velero_common::kube_utils::body_object_mut;
use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{
    ResourceKind, LABEL_CLEAR_MAC_ADDRESS, LABEL_GENERATE_NEW_FIRMWARE_UUID,
    LABEL_RESTORE_RUN_STRATEGY, RESTRICTED_LABELS,
};
use kubevirt_velero_graph::{ClusterLookup, GraphBuilder, GraphRoot, ScopedLookup};

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::{collect_graph, narrow, ActionError};

/// Rewrites VMs on the way back in and pulls their dependencies along.
pub struct VmRestoreAction {
    lookup: Arc<dyn ClusterLookup>,
}

impl VmRestoreAction {
    /// Create the action over a cluster lookup
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self { lookup }
    }
}

fn is_enabled(restore: &Restore, label: &str) -> bool {
    restore
        .label(label)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Replace `running` with the requested run strategy.
fn apply_run_strategy(item: &mut DynamicObject, strategy: &str) {
    if let Some(spec) = body_object_mut(item, "/spec") {
        spec.remove("running");
        spec.insert("runStrategy".to_string(), Value::String(strategy.to_string()));
    }
}

fn clear_mac_addresses(item: &mut DynamicObject) {
    let interfaces = item
        .data
        .pointer_mut("/spec/template/spec/domain/devices/interfaces")
        .and_then(Value::as_array_mut);
    for iface in interfaces.into_iter().flatten() {
        if let Some(iface) = iface.as_object_mut() {
            iface.remove("macAddress");
        }
    }
}

fn regenerate_firmware_uuid(item: &mut DynamicObject) {
    if let Some(domain) = body_object_mut(item, "/spec/template/spec/domain") {
        let firmware = domain
            .entry("firmware")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(firmware) = firmware.as_object_mut() {
            firmware.insert(
                "uuid".to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
    }
}

fn strip_template_labels(item: &mut DynamicObject) {
    if let Some(labels) = body_object_mut(item, "/spec/template/metadata/labels") {
        for key in RESTRICTED_LABELS {
            labels.remove(*key);
        }
    }
}

#[async_trait]
impl RestoreItemAction for VmRestoreAction {
    fn name(&self) -> &'static str {
        "restore-vm-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VirtualMachine])
    }

    #[instrument(skip_all, fields(restore = %restore.name()))]
    async fn execute(
        &self,
        mut item: DynamicObject,
        restore: &Restore,
        cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        let vm: VirtualMachine = narrow(&item)?;

        if let Some(strategy) = restore.label(LABEL_RESTORE_RUN_STRATEGY) {
            debug!(vm = %vm.name(), strategy = %strategy, "overriding run strategy");
            apply_run_strategy(&mut item, strategy);
        }
        if is_enabled(restore, LABEL_CLEAR_MAC_ADDRESS) {
            clear_mac_addresses(&mut item);
        }
        if is_enabled(restore, LABEL_GENERATE_NEW_FIRMWARE_UUID) {
            regenerate_firmware_uuid(&mut item);
        }
        strip_template_labels(&mut item);

        let lookup = ScopedLookup::new(self.lookup.as_ref(), cancel);
        let graph = GraphBuilder::new(lookup)
            .restore_graph(GraphRoot::VirtualMachine(&vm))
            .await;
        let extras = collect_graph(Vec::new(), graph)?;

        info!(
            vm = %vm.name(),
            namespace = %vm.namespace(),
            extras = extras.len(),
            "restoring VirtualMachine"
        );
        Ok(RestoreOutcome::restore(item, extras))
    }
}
