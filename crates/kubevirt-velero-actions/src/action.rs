//! Item action contracts
//!
//! Velero hands actions an untyped item and the request driving the
//! operation. Actions narrow the item to a typed view to decide, then edit
//! the untyped item so fields they do not model pass through untouched.

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use kubevirt_velero_common::velero::{Backup, Restore};
use kubevirt_velero_common::{ResourceKind, ResourceRef};

use crate::error::ActionError;

/// Which items an action wants to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    /// Resources (plural, group-qualified) the action applies to
    pub included_resources: Vec<String>,
    /// Optional `key=value` label selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

impl ResourceSelector {
    /// Select items of the given kinds
    pub fn kinds(kinds: &[ResourceKind]) -> Self {
        Self {
            included_resources: kinds.iter().map(qualified_resource).collect(),
            label_selector: None,
        }
    }

    /// Narrow the selection by label
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }
}

fn qualified_resource(kind: &ResourceKind) -> String {
    if kind.group().is_empty() {
        kind.resource().to_string()
    } else {
        format!("{}.{}", kind.resource(), kind.group())
    }
}

/// Result of a backup item action
#[derive(Debug)]
pub enum BackupOutcome {
    /// Back up `item` and everything in `extras`
    Continue {
        /// The (possibly annotated) item
        item: DynamicObject,
        /// Objects to capture alongside
        extras: Vec<ResourceRef>,
    },
    /// Leave the item out of the backup
    Skip,
}

impl BackupOutcome {
    /// Back up the item with no extras
    pub fn unchanged(item: DynamicObject) -> Self {
        Self::Continue {
            item,
            extras: Vec::new(),
        }
    }

    /// Back up the item together with `extras`
    pub fn with_extras(item: DynamicObject, extras: Vec<ResourceRef>) -> Self {
        Self::Continue { item, extras }
    }

    /// Whether the item is dropped from the backup
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Result of a restore item action
#[derive(Debug)]
pub struct RestoreOutcome {
    /// The (possibly rewritten) item
    pub item: DynamicObject,
    /// Objects to restore alongside
    pub extras: Vec<ResourceRef>,
    /// Keep the item in the backup but do not recreate it
    pub skip_restore: bool,
}

impl RestoreOutcome {
    /// Restore the item with the given extras
    pub fn restore(item: DynamicObject, extras: Vec<ResourceRef>) -> Self {
        Self {
            item,
            extras,
            skip_restore: false,
        }
    }

    /// Do not recreate the item
    pub fn skip(item: DynamicObject) -> Self {
        Self {
            item,
            extras: Vec::new(),
            skip_restore: true,
        }
    }
}

/// A Velero backup item action
#[async_trait]
pub trait BackupItemAction: Send + Sync {
    /// Registration name, without the plugin prefix
    fn name(&self) -> &'static str;

    /// Items this action is invoked for
    fn applies_to(&self) -> ResourceSelector;

    /// Process one item of `backup`.
    ///
    /// Lookups race `cancel`; on cancellation the action returns what it
    /// has collected together with a cancellation error.
    async fn execute(
        &self,
        item: DynamicObject,
        backup: &Backup,
        cancel: &CancellationToken,
    ) -> Result<BackupOutcome, ActionError>;
}

/// A Velero restore item action
#[async_trait]
pub trait RestoreItemAction: Send + Sync {
    /// Registration name, without the plugin prefix
    fn name(&self) -> &'static str;

    /// Items this action is invoked for
    fn applies_to(&self) -> ResourceSelector;

    /// Process one item of `restore`
    async fn execute(
        &self,
        item: DynamicObject,
        restore: &Restore,
        cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, ActionError>;
}
