//! VirtualMachineInstance restore action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kubevirt_velero_common::crd::VirtualMachineInstance;
use kubevirt_velero_common::kube_utils::annotation;
use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{ResourceKind, ANN_IS_OWNED};

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::{narrow, ActionError};
use crate::restore::strip_item_restricted_labels;

/// Skips VM-owned instances; the restored VM starts its own.
#[derive(Debug, Default)]
pub struct VmiRestoreAction;

impl VmiRestoreAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RestoreItemAction for VmiRestoreAction {
    fn name(&self) -> &'static str {
        "restore-vmi-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::VirtualMachineInstance])
    }

    async fn execute(
        &self,
        mut item: DynamicObject,
        _restore: &Restore,
        _cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        let vmi: VirtualMachineInstance = narrow(&item)?;
        let marked_owned = annotation(&vmi.metadata, ANN_IS_OWNED) == Some("true");
        if vmi.is_owned() || marked_owned {
            debug!(instance = %vmi.name(), namespace = %vmi.namespace(), "skipping owned instance");
            return Ok(RestoreOutcome::skip(item));
        }

        strip_item_restricted_labels(&mut item);
        Ok(RestoreOutcome::restore(item, Vec::new()))
    }
}
