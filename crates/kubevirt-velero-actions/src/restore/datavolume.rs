//! DataVolume restore action
//!
//! A restored DataVolume must adopt the claim Velero restores next to it
//! rather than populate a new one. Clone sources are rewritten to an upload
//! source pointing back at the DataVolume itself, and a stale
//! pre-populated marker is dropped.

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kubevirt_velero_common::crd::DataVolume;
use kubevirt_velero_common::kube_utils::{body_object_mut, ItemExt};
use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{ResourceKind, ANN_PRE_POPULATED};

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::{narrow, ActionError};

/// Resets cloned DataVolumes so they are not cloned again on restore.
#[derive(Debug, Default)]
pub struct DataVolumeRestoreAction;

impl DataVolumeRestoreAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

fn reset_clone_source(item: &mut DynamicObject, name: &str, namespace: &str) {
    if let Some(spec) = body_object_mut(item, "/spec") {
        spec.insert("source".to_string(), json!({"upload": {}}));
        spec.insert(
            "sourceRef".to_string(),
            json!({
                "kind": ResourceKind::DataVolume.kind_str(),
                "name": name,
                "namespace": namespace,
            }),
        );
    }
}

#[async_trait]
impl RestoreItemAction for DataVolumeRestoreAction {
    fn name(&self) -> &'static str {
        "restore-dv-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::DataVolume])
    }

    async fn execute(
        &self,
        mut item: DynamicObject,
        _restore: &Restore,
        _cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        let dv: DataVolume = narrow(&item)?;

        if dv.is_clone() {
            debug!(dv = %dv.name(), namespace = %dv.namespace(), "resetting clone source");
            reset_clone_source(&mut item, dv.name(), dv.namespace());
        }

        let pre_populated = item
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANN_PRE_POPULATED))
            .is_some_and(|v| v == dv.name());
        if pre_populated {
            item.annotations_mut().remove(ANN_PRE_POPULATED);
            item.prune_empty_metadata();
        }

        Ok(RestoreOutcome::restore(item, Vec::new()))
    }
}
