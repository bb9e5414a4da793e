//! Action registry and registration manifest
//!
//! Velero addresses item actions as `<plugin namespace>/<action name>`. The
//! registry resolves both that form and the bare action name, and renders
//! the manifest the hook server advertises.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use kubevirt_velero_common::PLUGIN_NAMESPACE;
use kubevirt_velero_graph::ClusterLookup;

use crate::action::{BackupItemAction, ResourceSelector, RestoreItemAction};
use crate::backup::{
    DataVolumeBackupAction, PodBackupAction, PvcBackupAction, VmBackupAction, VmiBackupAction,
    VolumeSnapshotBackupAction,
};
use crate::restore::{
    DataVolumeRestoreAction, PodRestoreAction, PvcRestoreAction, VmRestoreAction,
    VmiRestoreAction, VolumeSnapshotRestoreAction,
};

/// Which Velero hook an action implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PluginKind {
    /// Invoked while Velero serializes an item
    #[serde(rename = "BackupItemAction")]
    Backup,
    /// Invoked before Velero recreates an item
    #[serde(rename = "RestoreItemAction")]
    Restore,
}

/// One line of the registration manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifestEntry {
    /// Fully qualified action name
    pub name: String,
    /// Hook kind
    pub kind: PluginKind,
    /// Resources the action applies to
    pub applies_to: Vec<String>,
    /// Optional label selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

impl PluginManifestEntry {
    fn new(name: &str, kind: PluginKind, selector: ResourceSelector) -> Self {
        Self {
            name: qualified_name(name),
            kind,
            applies_to: selector.included_resources,
            label_selector: selector.label_selector,
        }
    }
}

/// `<plugin namespace>/<name>`
pub fn qualified_name(name: &str) -> String {
    format!("{}/{}", PLUGIN_NAMESPACE, name)
}

fn short_name(name: &str) -> &str {
    name.strip_prefix(PLUGIN_NAMESPACE)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
}

/// Registered backup and restore actions, keyed by short name
#[derive(Default)]
pub struct PluginRegistry {
    backup: BTreeMap<&'static str, Arc<dyn BackupItemAction>>,
    restore: BTreeMap<&'static str, Arc<dyn RestoreItemAction>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every KubeVirt action, sharing one cluster lookup
    pub fn with_default_actions(lookup: Arc<dyn ClusterLookup>) -> Self {
        let mut registry = Self::new();
        registry.register_backup(Arc::new(VmBackupAction::new()));
        registry.register_backup(Arc::new(VmiBackupAction::new(lookup.clone())));
        registry.register_backup(Arc::new(DataVolumeBackupAction::new(lookup.clone())));
        registry.register_backup(Arc::new(PvcBackupAction::new()));
        registry.register_backup(Arc::new(VolumeSnapshotBackupAction::new(lookup.clone())));
        registry.register_backup(Arc::new(PodBackupAction::new()));

        registry.register_restore(Arc::new(VmRestoreAction::new(lookup)));
        registry.register_restore(Arc::new(VmiRestoreAction::new()));
        registry.register_restore(Arc::new(DataVolumeRestoreAction::new()));
        registry.register_restore(Arc::new(PvcRestoreAction::new()));
        registry.register_restore(Arc::new(VolumeSnapshotRestoreAction::new()));
        registry.register_restore(Arc::new(PodRestoreAction::new()));
        registry
    }

    /// Add a backup action, replacing any with the same name
    pub fn register_backup(&mut self, action: Arc<dyn BackupItemAction>) {
        self.backup.insert(action.name(), action);
    }

    /// Add a restore action, replacing any with the same name
    pub fn register_restore(&mut self, action: Arc<dyn RestoreItemAction>) {
        self.restore.insert(action.name(), action);
    }

    /// Backup action by short or qualified name
    pub fn backup_action(&self, name: &str) -> Option<Arc<dyn BackupItemAction>> {
        self.backup.get(short_name(name)).cloned()
    }

    /// Restore action by short or qualified name
    pub fn restore_action(&self, name: &str) -> Option<Arc<dyn RestoreItemAction>> {
        self.restore.get(short_name(name)).cloned()
    }

    /// Registration manifest, backup actions first
    pub fn manifest(&self) -> Vec<PluginManifestEntry> {
        let backup = self
            .backup
            .values()
            .map(|a| PluginManifestEntry::new(a.name(), PluginKind::Backup, a.applies_to()));
        let restore = self
            .restore
            .values()
            .map(|a| PluginManifestEntry::new(a.name(), PluginKind::Restore, a.applies_to()));
        backup.chain(restore).collect()
    }
}
