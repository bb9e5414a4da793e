//! Launcher pod restore action

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;

use kubevirt_velero_common::velero::Restore;
use kubevirt_velero_common::{ResourceKind, VIRT_LAUNCHER_SELECTOR};

use crate::action::{ResourceSelector, RestoreItemAction, RestoreOutcome};
use crate::error::ActionError;

/// Never recreates launcher pods; KubeVirt starts fresh ones.
#[derive(Debug, Default)]
pub struct PodRestoreAction;

impl PodRestoreAction {
    /// Create the action
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RestoreItemAction for PodRestoreAction {
    fn name(&self) -> &'static str {
        "restore-pod-action"
    }

    fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::kinds(&[ResourceKind::Pod]).with_label_selector(VIRT_LAUNCHER_SELECTOR)
    }

    async fn execute(
        &self,
        item: DynamicObject,
        _restore: &Restore,
        _cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError> {
        Ok(RestoreOutcome::skip(item))
    }
}
